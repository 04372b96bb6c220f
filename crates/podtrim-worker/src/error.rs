//! Pipeline error types.

use std::path::PathBuf;

use podtrim_media::MediaError;
use podtrim_models::ModelError;
use thiserror::Error;

use crate::classifier::ClassificationError;
use crate::feed::FeedError;
use crate::transcription::TranscriptionError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required source or upstream artifact is missing.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The codec could not interpret the source audio.
    #[error("Cannot decode audio: {0}")]
    DecodeFailure(String),

    /// The classifier returned non-JSON or JSON without an `ads` key.
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    /// A valid outcome that leaves nothing to write.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// A caller-supplied artifact name that cannot be resolved safely.
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    /// Another run holds the lease for this source.
    #[error("A run is already in flight for {0}")]
    Busy(String),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Classification failed: {0}")]
    Classification(ClassificationError),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Invalid artifact: {0}")]
    Model(#[from] ModelError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn empty_result(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::DecodeFailure(_) => "decode_failure",
            Self::MalformedResponse(_) => "malformed_response",
            Self::EmptyResult(_) => "empty_result",
            Self::PreconditionViolation(_) => "precondition_violation",
            Self::InvalidName(_) => "invalid_name",
            Self::Busy(_) => "busy",
            Self::Transcription(_) => "transcription",
            Self::Classification(_) => "classification",
            Self::Media(_) => "media",
            Self::Model(_) => "invalid_artifact",
            Self::Feed(_) => "feed",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
        }
    }

    /// Whether re-invoking the same stage may succeed without manual action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy(_)
                | Self::Transcription(TranscriptionError::ApiRequestFailed(_))
                | Self::Classification(ClassificationError::RequestFailed(_))
                | Self::MalformedResponse(_)
                | Self::Feed(FeedError::Request(_))
        )
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        if err.is_decode_failure() {
            return Self::DecodeFailure(err.to_string());
        }
        match err {
            MediaError::FileNotFound(path) => Self::NotFound(path),
            MediaError::NothingToKeep => {
                Self::EmptyResult("all content marked as advertisement".to_string())
            }
            MediaError::Precondition(msg) => Self::PreconditionViolation(msg),
            MediaError::Io(e) => Self::Io(e),
            other => Self::Media(other),
        }
    }
}

impl From<ClassificationError> for PipelineError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::MalformedResponse(msg) => Self::MalformedResponse(msg),
            other => Self::Classification(other),
        }
    }
}
