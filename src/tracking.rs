//! Backend-independent tracking.
//!
//! Each backend adapter normalizes its native tracks into [`Track`] once, so
//! the counter never needs to know which backend produced them.

mod backend;
mod labels;

pub use backend::{
    AppearanceBackend, AppearanceEmbedder, ByteTrackBackend, ColorHistogramEmbedder,
    TrackerBackend, TrackerKind, TrackerManager, TrackingConfig,
};
pub use labels::{LabelMatching, LabelMemory};

use crate::counter::{ClassId, TrackId};
use crate::tracker::{AppearanceTrack, Rect, STrack};

/// Uniform view of a track for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: TrackId,
    pub tlwh: Rect,
    /// Survived the backend's confirmation latency
    pub is_confirmed: bool,
    /// `None` when the backend could not attribute a class yet
    pub class_id: Option<ClassId>,
    pub score: f32,
}

impl Track {
    pub fn ltrb(&self) -> [f32; 4] {
        self.tlwh.to_tlbr()
    }

    /// Wrap a motion track with the class recovered for it, if any.
    pub fn from_strack(track: &STrack, class_id: Option<ClassId>) -> Self {
        Self {
            track_id: track.track_id,
            tlwh: track.rect(),
            is_confirmed: track.is_activated,
            class_id,
            score: track.score,
        }
    }
}

impl From<&AppearanceTrack> for Track {
    fn from(track: &AppearanceTrack) -> Self {
        Self {
            track_id: track.track_id,
            tlwh: track.rect(),
            is_confirmed: track.is_confirmed(),
            class_id: Some(track.class_id),
            score: track.score,
        }
    }
}
