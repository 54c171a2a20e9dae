//! Tracker backends behind one interface, and the factory that picks them.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::integration::{DetectionBatch, Frame};
use crate::tracker::{
    AppearanceConfig, AppearanceDetection, AppearanceTracker, BYTETracker, Detection, Rect,
    TrackerConfig,
};
use crate::tracking::Track;
use crate::tracking::labels::{LabelMatching, LabelMemory};

/// A multi-object tracker driven one processed frame at a time.
pub trait TrackerBackend {
    fn name(&self) -> &'static str;

    /// Feed one frame of detections (source-frame TLBR) and get the current tracks.
    fn update(&mut self, frame: &Frame, detections: &DetectionBatch) -> Result<Vec<Track>>;
}

/// Computes appearance embeddings for detection crops.
pub trait AppearanceEmbedder {
    /// One entry per box; `None` when no embedding can be computed for it.
    fn embed(&mut self, frame: &Frame, boxes: &[[f32; 4]]) -> Result<Vec<Option<Array1<f32>>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerKind {
    ByteTrack,
    DeepSort,
}

impl TrackerKind {
    /// Resolve a configured backend name, e.g. `bytetrack` or `deepsort`.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("bytetrack") {
            Ok(Self::ByteTrack)
        } else if lower.contains("deepsort") {
            Ok(Self::DeepSort)
        } else {
            Err(Error::UnknownTracker(name.to_string()))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub bytetrack: TrackerConfig,
    pub deepsort: AppearanceConfig,
    pub labels: LabelMatching,
}

/// Motion-only tracker; classes are recovered through [`LabelMemory`].
pub struct ByteTrackBackend {
    tracker: BYTETracker,
    labels: LabelMemory,
}

impl ByteTrackBackend {
    pub fn new(config: TrackerConfig, matching: LabelMatching) -> Self {
        Self {
            tracker: BYTETracker::new(config),
            labels: LabelMemory::new(matching),
        }
    }

    pub fn tracker(&self) -> &BYTETracker {
        &self.tracker
    }

    pub fn labels(&self) -> &LabelMemory {
        &self.labels
    }
}

impl TrackerBackend for ByteTrackBackend {
    fn name(&self) -> &'static str {
        "bytetrack"
    }

    fn update(&mut self, _frame: &Frame, detections: &DetectionBatch) -> Result<Vec<Track>> {
        let inputs: Vec<Detection> = detections
            .iter()
            .map(|d| Detection::new(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3], d.score))
            .collect();
        let stracks = self.tracker.update(inputs);
        Ok(self.labels.reconcile(&stracks, detections))
    }
}

/// Appearance-assisted tracker; classes travel with the detections.
pub struct AppearanceBackend<E: AppearanceEmbedder> {
    tracker: AppearanceTracker,
    embedder: E,
}

impl<E: AppearanceEmbedder> AppearanceBackend<E> {
    pub fn new(config: AppearanceConfig, embedder: E) -> Self {
        Self {
            tracker: AppearanceTracker::new(config),
            embedder,
        }
    }

    pub fn tracker(&self) -> &AppearanceTracker {
        &self.tracker
    }
}

impl<E: AppearanceEmbedder> TrackerBackend for AppearanceBackend<E> {
    fn name(&self) -> &'static str {
        "deepsort"
    }

    fn update(&mut self, frame: &Frame, detections: &DetectionBatch) -> Result<Vec<Track>> {
        let features = self.embedder.embed(frame, detections.boxes())?;
        if features.len() != detections.len() {
            return Err(Error::Tracking(format!(
                "embedder returned {} features for {} detections",
                features.len(),
                detections.len()
            )));
        }

        let inputs = detections
            .iter()
            .zip(features)
            .map(|(d, feature)| AppearanceDetection {
                bbox: Rect::from(d.bbox),
                score: d.score,
                class_id: d.label,
                feature,
            })
            .collect();

        Ok(self.tracker.update(inputs).iter().map(Track::from).collect())
    }
}

/// Per-channel colour histogram of the box crop, L2-normalised.
#[derive(Debug, Clone)]
pub struct ColorHistogramEmbedder {
    bins: usize,
}

impl Default for ColorHistogramEmbedder {
    fn default() -> Self {
        Self { bins: 16 }
    }
}

impl ColorHistogramEmbedder {
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.clamp(1, 256) }
    }

    pub fn dim(&self) -> usize {
        self.bins * Frame::CHANNELS
    }

    fn histogram(&self, frame: &Frame, bbox: [f32; 4]) -> Option<Array1<f32>> {
        let (x0, y0, x1, y1) = Rect::from(bbox).clip_to(frame.width, frame.height)?;
        let mut hist = Array1::<f32>::zeros(self.dim());
        for y in y0..y1 {
            for x in x0..x1 {
                let px = frame.pixel(x, y)?;
                for (c, &value) in px.iter().enumerate() {
                    let bin = value as usize * self.bins / 256;
                    hist[c * self.bins + bin] += 1.0;
                }
            }
        }
        let norm = hist.dot(&hist).sqrt();
        (norm > 0.0).then(|| hist / norm)
    }
}

impl AppearanceEmbedder for ColorHistogramEmbedder {
    fn embed(&mut self, frame: &Frame, boxes: &[[f32; 4]]) -> Result<Vec<Option<Array1<f32>>>> {
        if !frame.is_complete() {
            return Err(Error::Tracking(format!(
                "frame buffer holds {} bytes, {}x{} needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.width as usize * frame.height as usize * Frame::CHANNELS
            )));
        }
        Ok(boxes.iter().map(|&b| self.histogram(frame, b)).collect())
    }
}

/// Owns the selected backend and applies the contract shared by all of them.
pub struct TrackerManager {
    backend: Box<dyn TrackerBackend>,
}

impl TrackerManager {
    /// Build the backend named `tracker`.
    ///
    /// The motion backend runs at the processed cadence, `nominal_fps / frame_skip`.
    pub fn new(
        tracker: &str,
        config: &TrackingConfig,
        nominal_fps: f32,
        frame_skip: u32,
    ) -> Result<Self> {
        let backend: Box<dyn TrackerBackend> = match TrackerKind::from_name(tracker)? {
            TrackerKind::ByteTrack => {
                let bytetrack = config.bytetrack.clone().with_cadence(nominal_fps, frame_skip);
                info!(
                    frame_rate = bytetrack.frame_rate,
                    track_thresh = bytetrack.track_thresh,
                    "using bytetrack backend"
                );
                Box::new(ByteTrackBackend::new(bytetrack, config.labels))
            }
            TrackerKind::DeepSort => {
                info!(
                    max_age = config.deepsort.max_age,
                    n_init = config.deepsort.n_init,
                    "using deepsort backend"
                );
                Box::new(AppearanceBackend::new(
                    config.deepsort.clone(),
                    ColorHistogramEmbedder::default(),
                ))
            }
        };
        Ok(Self { backend })
    }

    pub fn with_backend(backend: Box<dyn TrackerBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// No detections means no tracks; the backend is not consulted.
    pub fn update(&mut self, frame: &Frame, detections: &DetectionBatch) -> Result<Vec<Track>> {
        if detections.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.update(frame, detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectionBuilder;
    use std::cell::Cell;
    use std::rc::Rc;

    const CAR: u32 = 2;

    fn single(tlbr: [f32; 4], score: f32, label: u32) -> DetectionBatch {
        std::iter::once(
            DetectionBuilder::new()
                .tlbr(tlbr[0], tlbr[1], tlbr[2], tlbr[3])
                .score(score)
                .label(label)
                .build(),
        )
        .collect()
    }

    struct CountingBackend(Rc<Cell<u32>>);

    impl TrackerBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn update(&mut self, _: &Frame, _: &DetectionBatch) -> Result<Vec<Track>> {
            self.0.set(self.0.get() + 1);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(TrackerKind::from_name("bytetrack").unwrap(), TrackerKind::ByteTrack);
        assert_eq!(TrackerKind::from_name("DeepSort").unwrap(), TrackerKind::DeepSort);
        assert!(matches!(
            TrackerKind::from_name("sort"),
            Err(Error::UnknownTracker(name)) if name == "sort"
        ));
    }

    #[test]
    fn test_manager_rejects_unknown_backend() {
        let result = TrackerManager::new("botsort", &TrackingConfig::default(), 30.0, 1);
        assert!(matches!(result, Err(Error::UnknownTracker(_))));
    }

    #[test]
    fn test_empty_detections_skip_backend() {
        let calls = Rc::new(Cell::new(0));
        let mut manager = TrackerManager::with_backend(Box::new(CountingBackend(calls.clone())));

        let tracks = manager.update(&Frame::blank(8, 8), &DetectionBatch::new()).unwrap();
        assert!(tracks.is_empty());
        assert_eq!(calls.get(), 0);

        manager
            .update(&Frame::blank(8, 8), &single([0.0, 0.0, 4.0, 4.0], 0.9, CAR))
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_bytetrack_backend_recovers_labels() {
        let mut manager = TrackerManager::new("bytetrack", &TrackingConfig::default(), 30.0, 1)
            .unwrap();
        assert_eq!(manager.backend_name(), "bytetrack");

        let frame = Frame::blank(640, 480);
        let tracks = manager
            .update(&frame, &single([100.0, 100.0, 200.0, 200.0], 0.9, CAR))
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_confirmed);
        assert_eq!(tracks[0].class_id, Some(CAR));
    }

    #[test]
    fn test_appearance_backend_carries_labels() {
        let config = TrackingConfig {
            deepsort: AppearanceConfig {
                n_init: 1,
                ..AppearanceConfig::default()
            },
            ..TrackingConfig::default()
        };
        let mut manager = TrackerManager::new("deepsort", &config, 30.0, 1).unwrap();
        assert_eq!(manager.backend_name(), "deepsort");

        let mut frame = Frame::blank(320, 240);
        frame.fill_rect(100, 100, 140, 140, [200, 30, 30]);
        let tracks = manager
            .update(&frame, &single([100.0, 100.0, 140.0, 140.0], 0.8, 7))
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_confirmed);
        assert_eq!(tracks[0].class_id, Some(7));
    }

    #[test]
    fn test_histogram_embedding_is_normalised() {
        let mut frame = Frame::blank(20, 20);
        frame.fill_rect(0, 0, 10, 20, [255, 0, 0]);
        let mut embedder = ColorHistogramEmbedder::default();

        let features = embedder
            .embed(&frame, &[[0.0, 0.0, 20.0, 20.0], [50.0, 50.0, 60.0, 60.0]])
            .unwrap();

        let first = features[0].as_ref().unwrap();
        assert_eq!(first.len(), 48);
        assert!((first.dot(first) - 1.0).abs() < 1e-5);
        assert!(features[1].is_none());
    }

    #[test]
    fn test_histogram_rejects_truncated_frame() {
        let frame = Frame::new(10, 10, vec![0; 10]);
        let mut embedder = ColorHistogramEmbedder::default();
        assert!(matches!(
            embedder.embed(&frame, &[[0.0, 0.0, 5.0, 5.0]]),
            Err(Error::Tracking(_))
        ));
    }
}
