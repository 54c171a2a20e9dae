//! The frame loop: detect, track, count, render, emit.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::counter::{LineAuthoring, LineRegistry, ObjectCounter};
use crate::error::{Error, Result};
use crate::integration::{Detector, Frame, PaddingInfo};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::io::{
    Display, DisplayAction, FrameObjects, FrameSink, FrameView, PassthroughRenderer, Renderer,
    VideoSource,
};
use crate::pipeline::memory::{MemoryManager, ResourceReclaimer};
use crate::pipeline::summary::RunSummary;
use crate::tracking::TrackerManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Finalizing,
    Done,
}

enum FrameOutcome {
    Continue,
    Quit,
}

/// Drives one run over a video source.
///
/// Frames are handled strictly one after another; the line registry is only
/// mutated by the counter and only read by the renderer after counting.
pub struct VideoProcessor<D: Detector> {
    config: PipelineConfig,
    detector: D,
    tracker: Option<TrackerManager>,
    counter: Option<ObjectCounter>,
    registry: LineRegistry,
    memory: MemoryManager,
    renderer: Box<dyn Renderer>,
    display: Option<Box<dyn Display>>,
    sink: Option<Box<dyn FrameSink>>,
    class_names: &'static [&'static str],
    state: PipelineState,
}

impl<D: Detector> VideoProcessor<D> {
    /// Validate `config` and wire the components it enables.
    pub fn new(config: PipelineConfig, detector: D) -> Result<Self> {
        config.validate()?;
        let family = config.model_family()?;

        let counter = if config.processor.enable_counter {
            let allowed = config.allowed_class_ids()?;
            Some(ObjectCounter::new(allowed).with_policy(config.processor.counting_policy))
        } else {
            None
        };

        Ok(Self {
            memory: MemoryManager::new(config.memory.cleanup_interval),
            config,
            detector,
            tracker: None,
            counter,
            registry: LineRegistry::default(),
            renderer: Box::new(PassthroughRenderer),
            display: None,
            sink: None,
            class_names: family.class_names(),
            state: PipelineState::Idle,
        })
    }

    pub fn with_lines(mut self, registry: LineRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a prebuilt tracker instead of the one named in the config.
    pub fn with_tracker(mut self, tracker: TrackerManager) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_reclaimer(mut self, reclaimer: Box<dyn ResourceReclaimer>) -> Self {
        self.memory.register(reclaimer);
        self
    }

    /// Load the persisted lines, or let `drawer` author them first when
    /// drawing is enabled.
    pub fn load_lines(&mut self, drawer: Option<&mut dyn LineAuthoring>) -> Result<()> {
        let path = &self.config.lines_path;
        self.registry = match drawer {
            Some(drawer) if self.config.processor.enable_drawer => {
                LineRegistry::author(drawer, path)?
            }
            _ => LineRegistry::load(path)?,
        };
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn lines(&self) -> &LineRegistry {
        &self.registry
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Process `source` to the end, the frame budget or a user quit, then
    /// write the summary reports.
    pub fn run(&mut self, source: &mut dyn VideoSource) -> Result<RunSummary> {
        if self.state != PipelineState::Idle {
            return Err(Error::InvalidConfig("a processor runs only once".into()));
        }

        let props = source.open()?;
        let processor = &self.config.processor;
        let frame_skip = processor.frame_skip as u64;
        let padding = PaddingInfo::calculate(props.width, props.height, self.config.target_size);

        if processor.enable_tracking && self.tracker.is_none() {
            self.tracker = Some(TrackerManager::new(
                &processor.tracker,
                &self.config.tracking_config(),
                props.fps,
                processor.frame_skip,
            )?);
        }
        if !processor.enable_tracking {
            self.tracker = None;
        }

        let mut summary = RunSummary::new(processor.model.clone(), self.class_names);
        summary.tracker = self
            .tracker
            .as_ref()
            .map(|t| t.backend_name().to_string());
        summary.input_path = self.config.video.input_path.clone();
        summary.output_path = self.config.video.output_path.clone();
        summary.frame_skip = processor.frame_skip;

        info!(
            model = %summary.model,
            tracker = summary.tracker.as_deref().unwrap_or("none"),
            fps = props.fps,
            width = props.width,
            height = props.height,
            total_frames = ?props.total_frames,
            lines = self.registry.len(),
            "processing started"
        );

        self.state = PipelineState::Running;
        summary.start();

        let max_frames = processor.max_frames;
        let mut frame_index: u64 = 0;
        while max_frames.is_none_or(|max| frame_index <= max) {
            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(frame_index, error = %e, "frame read failed, ending stream");
                    break;
                }
            };
            summary.frames_read += 1;

            if frame_index % frame_skip == 0 {
                let outcome = match self.process_frame(&frame, &padding, &mut summary) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.release_handles(source);
                        self.state = PipelineState::Done;
                        return Err(e);
                    }
                };
                if let FrameOutcome::Quit = outcome {
                    info!(frame_index, "stopped by user");
                    summary.cancelled = true;
                    break;
                }
                self.memory.maybe_cleanup(summary.frames_processed);
            }

            frame_index += 1;
        }

        self.state = PipelineState::Finalizing;
        let finalized = self.finalize(source, &mut summary);
        self.state = PipelineState::Done;
        finalized.map(|()| summary)
    }

    fn process_frame(
        &mut self,
        frame: &Frame,
        padding: &PaddingInfo,
        summary: &mut RunSummary,
    ) -> Result<FrameOutcome> {
        let start = Instant::now();

        let detections = self
            .detector
            .detect(frame, padding)
            .map_err(|e| Error::Detection(Box::new(e)))?;
        summary.record_detections(detections.len());

        let tracks = match self.tracker.as_mut() {
            Some(tracker) => Some(tracker.update(frame, &detections)?),
            None => None,
        };

        if let (Some(counter), Some(tracks)) = (&self.counter, &tracks) {
            counter.update(tracks, &mut self.registry);
        }

        let elapsed = start.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };
        summary.record_frame(fps);

        let objects = match &tracks {
            Some(tracks) => FrameObjects::Tracks(tracks),
            None => FrameObjects::Detections(&detections),
        };
        let view = FrameView { objects, fps };
        let annotated = self.renderer.render(frame, &view, &self.registry);

        debug!(
            frame = summary.frames_processed,
            detections = detections.len(),
            tracks = tracks.as_ref().map(Vec::len),
            fps,
            "frame processed"
        );

        if self.config.processor.enable_display {
            if let Some(display) = self.display.as_mut() {
                if display.show(&annotated) == DisplayAction::Quit {
                    return Ok(FrameOutcome::Quit);
                }
            }
        }

        if self.config.processor.enable_save {
            if let Some(sink) = self.sink.as_mut() {
                sink.write(&annotated)?;
            }
        }

        Ok(FrameOutcome::Continue)
    }

    /// Handles are released before the reports are written, so a failed
    /// export still leaves the sink flushed.
    fn finalize(&mut self, source: &mut dyn VideoSource, summary: &mut RunSummary) -> Result<()> {
        summary.finish();
        if self.counter.is_some() {
            summary.fold_lines(&self.registry);
        }

        self.release_handles(source);

        let (txt, csv) = summary.export(&self.config.summary_dir)?;
        info!(
            frames_processed = summary.frames_processed,
            detections = summary.total_detections,
            counted = summary.total_up() + summary.total_down(),
            report = %txt.display(),
            csv = %csv.display(),
            "processing finished"
        );
        Ok(())
    }

    fn release_handles(&mut self, source: &mut dyn VideoSource) {
        source.release();
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.release() {
                warn!(error = %e, "failed to release frame sink");
            }
        }
        if let Some(display) = self.display.as_mut() {
            display.close();
        }
    }
}
