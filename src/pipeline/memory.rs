//! Periodic release of accelerator scratch memory.

use tracing::{debug, warn};

use crate::error::Result;

/// Something that can hand transient memory back, e.g. an accelerator cache.
pub trait ResourceReclaimer {
    fn name(&self) -> &str {
        "reclaimer"
    }

    fn reclaim(&mut self) -> Result<()>;
}

/// Runs every registered reclaimer each `interval` processed frames.
///
/// Without reclaimers (no accelerator) a due pass does nothing. Failures are
/// logged and never reach the caller.
pub struct MemoryManager {
    interval: u64,
    reclaimers: Vec<Box<dyn ResourceReclaimer>>,
    passes: u64,
}

impl MemoryManager {
    /// An interval of 0 disables cleanup.
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            reclaimers: Vec::new(),
            passes: 0,
        }
    }

    pub fn with_reclaimer(mut self, reclaimer: Box<dyn ResourceReclaimer>) -> Self {
        self.register(reclaimer);
        self
    }

    pub fn register(&mut self, reclaimer: Box<dyn ResourceReclaimer>) {
        self.reclaimers.push(reclaimer);
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Cleanup passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn is_due(&self, frame_counter: u64) -> bool {
        self.interval > 0 && frame_counter > 0 && frame_counter % self.interval == 0
    }

    pub fn maybe_cleanup(&mut self, frame_counter: u64) {
        if !self.is_due(frame_counter) {
            return;
        }
        self.passes += 1;
        for reclaimer in &mut self.reclaimers {
            if let Err(e) = reclaimer.reclaim() {
                warn!(reclaimer = reclaimer.name(), error = %e, "memory cleanup failed");
            }
        }
        debug!(frame_counter, reclaimers = self.reclaimers.len(), "memory cleanup pass");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        calls: Rc<RefCell<u32>>,
        fail: bool,
    }

    impl ResourceReclaimer for Recorder {
        fn reclaim(&mut self) -> Result<()> {
            *self.calls.borrow_mut() += 1;
            if self.fail {
                Err(Error::Io(std::io::Error::other("device busy")))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_fires_on_multiples() {
        let calls = Rc::new(RefCell::new(0));
        let mut manager = MemoryManager::new(3).with_reclaimer(Box::new(Recorder {
            calls: calls.clone(),
            fail: false,
        }));

        for counter in 1..=10 {
            manager.maybe_cleanup(counter);
        }
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(manager.passes(), 3);
    }

    #[test]
    fn test_failures_are_swallowed() {
        let calls = Rc::new(RefCell::new(0));
        let mut manager = MemoryManager::new(1)
            .with_reclaimer(Box::new(Recorder {
                calls: calls.clone(),
                fail: true,
            }))
            .with_reclaimer(Box::new(Recorder {
                calls: calls.clone(),
                fail: false,
            }));

        manager.maybe_cleanup(1);
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn test_zero_interval_disables() {
        let manager = MemoryManager::new(0);
        assert!(!manager.is_due(0));
        assert!(!manager.is_due(100));
    }

    #[test]
    fn test_no_reclaimers_is_noop() {
        let mut manager = MemoryManager::new(2);
        manager.maybe_cleanup(2);
        assert_eq!(manager.passes(), 1);
    }
}
