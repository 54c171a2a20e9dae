//! Detector seam: the per-frame `(boxes, scores, labels)` contract.

use crate::integration::frame::Frame;
use crate::integration::padding::PaddingInfo;
use crate::integration::postprocess::{DetectionFilter, Nms};

/// A single labelled detection in TLBR form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledDetection {
    pub bbox: [f32; 4],
    pub score: f32,
    pub label: u32,
}

/// Detections of one frame, stored as parallel columns.
///
/// Columns only grow through [`push`](Self::push), so `boxes()[i]`,
/// `scores()[i]` and `labels()[i]` always describe the same object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBatch {
    /// TLBR (x1, y1, x2, y2)
    boxes: Vec<[f32; 4]>,
    scores: Vec<f32>,
    labels: Vec<u32>,
}

impl DetectionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[[f32; 4]] {
        &self.boxes
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn push(&mut self, detection: LabeledDetection) {
        self.boxes.push(detection.bbox);
        self.scores.push(detection.score);
        self.labels.push(detection.label);
    }

    pub fn get(&self, index: usize) -> Option<LabeledDetection> {
        Some(LabeledDetection {
            bbox: *self.boxes.get(index)?,
            score: *self.scores.get(index)?,
            label: *self.labels.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = LabeledDetection> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Keep the detections at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }
}

impl FromIterator<LabeledDetection> for DetectionBatch {
    fn from_iter<I: IntoIterator<Item = LabeledDetection>>(iter: I) -> Self {
        let mut batch = Self::new();
        for detection in iter {
            batch.push(detection);
        }
        batch
    }
}

/// Object detection backend.
///
/// Implementations return boxes in source-frame coordinates, already
/// filtered by confidence (and class, when configured).
///
/// # Example
///
/// ```
/// use crossline_rs::{DetectionBatch, Detector, Frame, PaddingInfo};
///
/// struct NoDetections;
///
/// impl Detector for NoDetections {
///     type Error = std::convert::Infallible;
///
///     fn detect(
///         &mut self,
///         _frame: &Frame,
///         _padding: &PaddingInfo,
///     ) -> Result<DetectionBatch, Self::Error> {
///         Ok(DetectionBatch::new())
///     }
/// }
/// ```
pub trait Detector {
    type Error: std::error::Error + Send + Sync + 'static;

    fn detect(&mut self, frame: &Frame, padding: &PaddingInfo)
    -> Result<DetectionBatch, Self::Error>;
}

/// A raw detection model: letterboxes and runs the network, nothing else.
pub trait InferenceModel {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Side of the square network input.
    fn input_size(&self) -> u32 {
        640
    }

    /// Raw predictions in padded detector space (TLBR), before any filtering.
    fn infer(&mut self, frame: &Frame, padding: &PaddingInfo)
    -> Result<DetectionBatch, Self::Error>;
}

/// Wraps an [`InferenceModel`] with filter, NMS and un-padding.
pub struct ModelDetector<M: InferenceModel> {
    model: M,
    filter: DetectionFilter,
    nms: Option<Nms>,
}

impl<M: InferenceModel> ModelDetector<M> {
    pub fn new(model: M, filter: DetectionFilter) -> Self {
        Self {
            model,
            filter,
            nms: None,
        }
    }

    pub fn with_nms(mut self, nms: Nms) -> Self {
        self.nms = Some(nms);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: InferenceModel> Detector for ModelDetector<M> {
    type Error = M::Error;

    fn detect(
        &mut self,
        frame: &Frame,
        padding: &PaddingInfo,
    ) -> Result<DetectionBatch, Self::Error> {
        let raw = self.model.infer(frame, padding)?;
        let mut batch = self.filter.apply(&raw);
        if let Some(nms) = &self.nms {
            batch = nms.apply(&batch);
        }
        padding.unpad_boxes(&mut batch.boxes);
        Ok(batch)
    }
}
