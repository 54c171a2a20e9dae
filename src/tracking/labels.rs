//! Class recovery for backends that drop detection labels.
//!
//! Every emitted track is matched back to one of the frame's detections; the
//! label of the most confident observation seen so far wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::counter::{ClassId, TrackId};
use crate::integration::DetectionBatch;
use crate::tracker::{Rect, STrack};
use crate::tracking::Track;

fn default_min_iou() -> f32 {
    0.5
}

/// How a track is matched back to a detection of the same frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LabelMatching {
    /// The detection whose score equals the track score bit for bit.
    #[default]
    ExactScore,
    /// The detection with the highest IoU against the track box.
    Iou {
        #[serde(default = "default_min_iou")]
        min_iou: f32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LabelMemory {
    matching: LabelMatching,
    best: HashMap<TrackId, (ClassId, f32)>,
}

impl LabelMemory {
    pub fn new(matching: LabelMatching) -> Self {
        Self {
            matching,
            best: HashMap::new(),
        }
    }

    pub fn matching(&self) -> LabelMatching {
        self.matching
    }

    /// Record an observation. Only a strictly higher score replaces the stored
    /// label. Returns whether the memory changed.
    pub fn observe(&mut self, track_id: TrackId, label: ClassId, score: f32) -> bool {
        match self.best.get(&track_id) {
            Some(&(_, best)) if score <= best => false,
            _ => {
                self.best.insert(track_id, (label, score));
                true
            }
        }
    }

    pub fn label(&self, track_id: TrackId) -> Option<ClassId> {
        self.best.get(&track_id).map(|&(label, _)| label)
    }

    pub fn best(&self, track_id: TrackId) -> Option<(ClassId, f32)> {
        self.best.get(&track_id).copied()
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Attach classes to one frame of motion tracks.
    ///
    /// Tracks with no matching detection keep whatever label they had before;
    /// a track never matched so far comes out with `class_id == None`.
    pub fn reconcile(&mut self, tracks: &[STrack], detections: &DetectionBatch) -> Vec<Track> {
        tracks
            .iter()
            .map(|track| {
                if let Some(det) = self
                    .find_detection(track, detections)
                    .and_then(|idx| detections.get(idx))
                {
                    self.observe(track.track_id, det.label, det.score);
                }
                Track::from_strack(track, self.label(track.track_id))
            })
            .collect()
    }

    fn find_detection(&self, track: &STrack, detections: &DetectionBatch) -> Option<usize> {
        match self.matching {
            LabelMatching::ExactScore => detections.scores().iter().position(|&s| s == track.score),
            LabelMatching::Iou { min_iou } => {
                let track_rect = track.rect();
                detections
                    .boxes()
                    .iter()
                    .map(|&b| track_rect.iou(&Rect::from(b)))
                    .enumerate()
                    .filter(|&(_, iou)| iou >= min_iou)
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(idx, _)| idx)
            }
        }
    }
}
