//! Run configuration, loaded from JSON with every field defaulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::counter::CountingPolicy;
use crate::error::{Error, Result};
use crate::integration::{DEFAULT_ALLOWED_CLASSES, DetectionFilter, ModelFamily, Nms, NmsKind};
use crate::tracker::{AppearanceConfig, TrackerConfig};
use crate::tracking::{LabelMatching, TrackerKind, TrackingConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Detector model identity, e.g. `yolov8n`
    pub model: String,
    /// Tracking backend name, `bytetrack` or `deepsort`
    pub tracker: String,
    /// Only every `frame_skip`-th source frame is processed
    pub frame_skip: u32,
    /// Highest source frame index read; `None` reads the whole source
    pub max_frames: Option<u64>,
    pub enable_tracking: bool,
    pub enable_counter: bool,
    pub enable_display: bool,
    pub enable_save: bool,
    pub enable_drawer: bool,
    pub counting_policy: CountingPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model: "yolov8n".to_string(),
            tracker: "bytetrack".to_string(),
            frame_skip: 1,
            max_frames: Some(400),
            enable_tracking: true,
            enable_counter: true,
            enable_display: false,
            enable_save: true,
            enable_drawer: false,
            counting_policy: CountingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Confidence threshold, detections must score strictly above it
    pub threshold: f32,
    pub iou_threshold: f32,
    pub nms: NmsKind,
    /// Class names kept by the detector and the counter; empty keeps all
    pub allowed_classes: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            iou_threshold: 0.45,
            nms: NmsKind::None,
            allowed_classes: DEFAULT_ALLOWED_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackersConfig {
    pub bytetrack: TrackerConfig,
    pub deepsort: AppearanceConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub matching: LabelMatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Processed frames between cleanup passes, 0 disables cleanup
    pub cleanup_interval: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub processor: ProcessorConfig,
    pub detector: DetectorConfig,
    pub trackers: TrackersConfig,
    pub labels: LabelsConfig,
    pub memory: MemoryConfig,
    pub video: VideoConfig,
    pub lines_path: PathBuf,
    pub summary_dir: PathBuf,
    /// Side of the square detector input
    pub target_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            detector: DetectorConfig::default(),
            trackers: TrackersConfig::default(),
            labels: LabelsConfig::default(),
            memory: MemoryConfig::default(),
            video: VideoConfig::default(),
            lines_path: PathBuf::from("lines_geometry.json"),
            summary_dir: PathBuf::from("Summary"),
            target_size: 640,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            model = %config.processor.model,
            tracker = %config.processor.tracker,
            "loaded pipeline config"
        );
        Ok(config)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.processor.frame_skip == 0 {
            return Err(Error::InvalidConfig("frame_skip must be at least 1".into()));
        }
        if self.target_size == 0 {
            return Err(Error::InvalidConfig("target_size must be at least 1".into()));
        }
        if self.processor.enable_tracking {
            TrackerKind::from_name(&self.processor.tracker)?;
        }
        self.allowed_class_ids()?;
        Ok(())
    }

    pub fn model_family(&self) -> Result<ModelFamily> {
        ModelFamily::from_model_name(&self.processor.model)
    }

    /// Allowed class names resolved against the model's class table.
    pub fn allowed_class_ids(&self) -> Result<Vec<u32>> {
        self.model_family()?
            .resolve_allowed_classes(&self.detector.allowed_classes)
    }

    pub fn detection_filter(&self) -> Result<DetectionFilter> {
        let threshold = self.detector.threshold;
        Ok(if self.detector.allowed_classes.is_empty() {
            DetectionFilter::score_only(threshold)
        } else {
            DetectionFilter::new(threshold, self.allowed_class_ids()?)
        })
    }

    pub fn nms(&self) -> Nms {
        Nms::new(self.detector.iou_threshold, self.detector.nms)
    }

    pub fn tracking_config(&self) -> TrackingConfig {
        TrackingConfig {
            bytetrack: self.trackers.bytetrack.clone(),
            deepsort: self.trackers.deepsort.clone(),
            labels: self.labels.matching,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.processor.frame_skip, 1);
        assert_eq!(config.processor.max_frames, Some(400));
        assert_eq!(config.memory.cleanup_interval, 100);
        assert_eq!(config.lines_path, PathBuf::from("lines_geometry.json"));
        assert_eq!(config.allowed_class_ids().unwrap(), vec![0, 2, 7, 5]);
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "processor": {"model": "fasterrcnn_resnet50_fpn", "tracker": "deepsort",
                              "frame_skip": 2, "max_frames": null,
                              "counting_policy": "rearmable"},
                "detector": {"nms": "gated", "allowed_classes": ["car"]},
                "trackers": {"bytetrack": {"track_buffer": 60}, "deepsort": {"n_init": 2}},
                "labels": {"matching": {"method": "iou", "min_iou": 0.3}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.processor.frame_skip, 2);
        assert_eq!(config.processor.max_frames, None);
        assert_eq!(config.processor.counting_policy, CountingPolicy::Rearmable);
        assert_eq!(config.nms(), Nms::new(0.45, NmsKind::Gated));
        assert_eq!(config.allowed_class_ids().unwrap(), vec![3]);

        let tracking = config.tracking_config();
        assert_eq!(tracking.bytetrack.track_buffer, 60);
        assert_eq!(tracking.bytetrack.track_thresh, 0.5);
        assert_eq!(tracking.deepsort.n_init, 2);
        assert_eq!(tracking.labels, LabelMatching::Iou { min_iou: 0.3 });
    }

    #[test]
    fn test_validation_failures() {
        let zero_skip = r#"{"processor": {"frame_skip": 0}}"#;
        assert!(matches!(
            PipelineConfig::from_json_str(zero_skip),
            Err(Error::InvalidConfig(_))
        ));

        let tracker = r#"{"processor": {"tracker": "sort"}}"#;
        assert!(matches!(
            PipelineConfig::from_json_str(tracker),
            Err(Error::UnknownTracker(_))
        ));

        let model = r#"{"processor": {"model": "detr"}}"#;
        assert!(matches!(
            PipelineConfig::from_json_str(model),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"summary_dir": "out"}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.summary_dir, PathBuf::from("out"));
    }
}
