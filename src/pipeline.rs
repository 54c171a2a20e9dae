//! Run orchestration: configuration, the frame loop and its collaborators.

mod config;
mod io;
mod memory;
mod processor;
mod summary;

pub use config::{
    DetectorConfig, LabelsConfig, MemoryConfig, PipelineConfig, ProcessorConfig, TrackersConfig,
    VideoConfig,
};
pub use io::{
    Display, DisplayAction, FrameObjects, FrameSink, FrameView, PassthroughRenderer, Renderer,
    VideoProperties, VideoSource,
};
pub use memory::{MemoryManager, ResourceReclaimer};
pub use processor::{PipelineState, VideoProcessor};
pub use summary::{FpsStats, RunSummary};
