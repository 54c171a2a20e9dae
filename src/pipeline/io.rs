//! Video I/O and presentation collaborators driven by the processor.

use crate::counter::LineRegistry;
use crate::error::Result;
use crate::integration::{DetectionBatch, Frame};
use crate::tracking::Track;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    /// Nominal source frame rate
    pub fps: f32,
    pub width: u32,
    pub height: u32,
    /// Frame count reported by the container, if known
    pub total_frames: Option<u64>,
}

pub trait VideoSource {
    /// Open the stream. Failure aborts the run.
    fn open(&mut self) -> Result<VideoProperties>;

    /// Next frame, `Ok(None)` at the end of the stream. An error is treated
    /// as the end of the stream as well.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    fn release(&mut self) {}
}

/// What was found in a frame, as handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub enum FrameObjects<'a> {
    Detections(&'a DetectionBatch),
    Tracks(&'a [Track]),
}

#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub objects: FrameObjects<'a>,
    pub fps: f64,
}

/// Draws annotations. Must not alter counting state, hence the shared borrow
/// of the registry.
pub trait Renderer {
    fn render(&mut self, frame: &Frame, view: &FrameView<'_>, lines: &LineRegistry) -> Frame;
}

/// Leaves frames untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&mut self, frame: &Frame, _view: &FrameView<'_>, _lines: &LineRegistry) -> Frame {
        frame.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Continue,
    /// The user asked to stop; the run finalizes with what it has.
    Quit,
}

pub trait Display {
    fn show(&mut self, frame: &Frame) -> DisplayAction;

    fn close(&mut self) {}
}

/// Destination of annotated frames, e.g. a video writer.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
