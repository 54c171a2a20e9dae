//! Line-crossing object counting for video streams.
//!
//! Detections from any [`Detector`] are tracked by an interchangeable
//! backend (ByteTrack or an appearance-assisted DeepSORT-style tracker) and
//! every confirmed track is checked against user-defined counting lines.
//! [`VideoProcessor`] drives the whole loop and produces a [`RunSummary`].

pub mod counter;
pub mod error;
pub mod geometry;
pub mod integration;
pub mod logging;
pub mod pipeline;
pub mod tracker;
pub mod tracking;

pub use counter::{
    ClassId, CountingLine, CountingPolicy, Direction, LineAuthoring, LineCounts, LineRegistry,
    ObjectCounter, TrackId,
};
pub use error::{Error, Result};
pub use geometry::Point;
pub use integration::{
    DetectionBatch, DetectionBuilder, DetectionFilter, Detector, Frame, InferenceModel,
    LabeledDetection, ModelDetector, ModelFamily, PaddingInfo,
};
pub use pipeline::{
    Display, DisplayAction, FrameSink, PipelineConfig, ResourceReclaimer, RunSummary,
    VideoProcessor, VideoProperties, VideoSource,
};
pub use tracking::{Track, TrackerBackend, TrackerManager, TrackingConfig};
