//! Integration points for object detection backends.
//!
//! Any inference backend plugs in through [`Detector`]; raw models can be
//! wrapped in a [`ModelDetector`] which applies confidence filtering, NMS and
//! letterbox removal so boxes come back in source-frame coordinates.

mod builder;
mod classes;
mod detector;
mod frame;
mod padding;
mod postprocess;

pub use builder::DetectionBuilder;
pub use classes::{COCO_80, COCO_91, DEFAULT_ALLOWED_CLASSES, ModelFamily, class_name};
pub use detector::{DetectionBatch, Detector, InferenceModel, LabeledDetection, ModelDetector};
pub use frame::Frame;
pub use padding::PaddingInfo;
pub use postprocess::{DetectionFilter, GATED_SCORE_THRESHOLD, Nms, NmsKind, non_max_suppression};
