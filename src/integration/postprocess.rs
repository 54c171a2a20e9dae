//! Confidence/class filtering and non-maximum suppression on detection batches.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::integration::detector::DetectionBatch;
use crate::tracker::Rect;

/// Scores below this never enter gated suppression.
pub const GATED_SCORE_THRESHOLD: f32 = 0.3;

/// Keeps detections above a confidence threshold and, optionally, inside a
/// class allow-list.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    threshold: f32,
    allowed: Option<HashSet<u32>>,
}

impl DetectionFilter {
    pub fn new(threshold: f32, allowed: impl IntoIterator<Item = u32>) -> Self {
        Self {
            threshold,
            allowed: Some(allowed.into_iter().collect()),
        }
    }

    /// Confidence only, every class passes.
    pub fn score_only(threshold: f32) -> Self {
        Self {
            threshold,
            allowed: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn accepts(&self, score: f32, label: u32) -> bool {
        score > self.threshold && self.allowed.as_ref().is_none_or(|set| set.contains(&label))
    }

    pub fn apply(&self, batch: &DetectionBatch) -> DetectionBatch {
        batch.iter().filter(|d| self.accepts(d.score, d.label)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NmsKind {
    #[default]
    None,
    /// Plain greedy suppression.
    Greedy,
    /// Greedy suppression over detections scoring at least
    /// [`GATED_SCORE_THRESHOLD`].
    Gated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nms {
    pub iou_threshold: f32,
    pub kind: NmsKind,
}

impl Nms {
    pub fn new(iou_threshold: f32, kind: NmsKind) -> Self {
        Self {
            iou_threshold,
            kind,
        }
    }

    pub fn apply(&self, batch: &DetectionBatch) -> DetectionBatch {
        match self.kind {
            NmsKind::None => batch.clone(),
            NmsKind::Greedy => batch.select(&non_max_suppression(batch, self.iou_threshold)),
            NmsKind::Gated => {
                let gated: Vec<usize> = batch
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.score >= GATED_SCORE_THRESHOLD)
                    .map(|(i, _)| i)
                    .collect();
                let candidates = batch.select(&gated);
                let keep = non_max_suppression(&candidates, self.iou_threshold);
                candidates.select(&keep)
            }
        }
    }
}

/// Class-agnostic greedy NMS. Returns the kept indices, highest score first.
pub fn non_max_suppression(batch: &DetectionBatch, iou_threshold: f32) -> Vec<usize> {
    let scores = batch.scores();
    let mut order: Vec<usize> = (0..batch.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let rects: Vec<Rect> = batch.boxes().iter().map(|&b| Rect::from(b)).collect();
    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for index in order {
        let suppressed = keep
            .iter()
            .any(|&kept| rects[kept].iou(&rects[index]) > iou_threshold);
        if !suppressed {
            keep.push(index);
        }
    }
    keep
}
