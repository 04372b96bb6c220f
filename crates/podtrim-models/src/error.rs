//! Errors raised while decoding model documents.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized transcript shape: {0}")]
    UnrecognizedTranscript(String),

    #[error("Invalid transcript segment at index {index}: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("Analysis document is missing the 'ads' key")]
    MissingAds,
}

impl ModelError {
    pub fn invalid_segment(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidSegment {
            index,
            reason: reason.into(),
        }
    }
}
