mod appearance_tracker;
mod byte_tracker;
mod kalman_filter;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use appearance_tracker::{
    AppearanceConfig, AppearanceDetection, AppearanceTrack, AppearanceTracker,
};
pub use byte_tracker::{BYTETracker, TrackerConfig};
pub use kalman_filter::KalmanFilter;
pub use matching::Detection;
pub use rect::{Rect, iou_batch};
pub use strack::STrack;
pub use track_state::{ConfirmationState, TrackState};
