//! Model families and their class-name tables.

use crate::error::{Error, Result};

pub const COCO_80: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Category ids of the original COCO annotation, `N/A` for unused slots.
pub const COCO_91: [&str; 91] = [
    "__background__", "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train",
    "truck", "boat", "traffic light", "fire hydrant", "N/A", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "N/A",
    "backpack", "umbrella", "N/A", "N/A", "handbag", "tie", "suitcase", "frisbee", "skis",
    "snowboard", "sports ball", "kite", "baseball bat", "baseball glove", "skateboard",
    "surfboard", "tennis racket", "bottle", "N/A", "wine glass", "cup", "fork", "knife", "spoon",
    "bowl", "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza",
    "donut", "cake", "chair", "couch", "potted plant", "bed", "N/A", "dining table", "N/A", "N/A",
    "toilet", "N/A", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave",
    "oven", "toaster", "sink", "refrigerator", "N/A", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

pub const DEFAULT_ALLOWED_CLASSES: [&str; 4] = ["person", "car", "truck", "bus"];

const COCO_80_PREFIXES: [&str; 5] = ["yolov5", "yolov8", "yolo11", "yolo12", "yolox"];
const COCO_91_PREFIXES: [&str; 2] = ["fasterrcnn", "tf_efficientdet"];

/// Label space a detector family emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Coco80,
    Coco91,
}

impl ModelFamily {
    pub fn from_model_name(name: &str) -> Result<Self> {
        let lower = name.to_ascii_lowercase();
        if COCO_80_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            Ok(Self::Coco80)
        } else if COCO_91_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            Ok(Self::Coco91)
        } else {
            Err(Error::UnsupportedModel(name.to_string()))
        }
    }

    pub fn class_names(&self) -> &'static [&'static str] {
        match self {
            Self::Coco80 => &COCO_80,
            Self::Coco91 => &COCO_91,
        }
    }

    pub fn class_id(&self, name: &str) -> Option<u32> {
        self.class_names()
            .iter()
            .position(|&n| n != "N/A" && n == name)
            .map(|i| i as u32)
    }

    /// Human-readable name, `Class {id}` when the id is outside the table.
    pub fn class_name(&self, id: u32) -> String {
        class_name(self.class_names(), id)
    }

    pub fn resolve_allowed_classes<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<u32>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.class_id(name).ok_or_else(|| {
                    Error::InvalidConfig(format!("unknown class name '{name}' for {self:?}"))
                })
            })
            .collect()
    }
}

pub fn class_name(table: &[&str], id: u32) -> String {
    table
        .get(id as usize)
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("Class {id}"))
}
