//! Error type shared by the counting pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The tracker factory was asked for a backend it does not know.
    #[error("unsupported tracking algorithm: {0}")]
    UnknownTracker(String),

    /// The model identity does not belong to a supported detector family.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The video source could not be opened. Fatal for the run.
    #[error("failed to open video source: {0}")]
    SourceOpen(String),

    #[error("detection failed: {0}")]
    Detection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("tracking failed: {0}")]
    Tracking(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
