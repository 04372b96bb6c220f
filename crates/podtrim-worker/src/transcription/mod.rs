//! Speech-to-text collaborators.

mod whisper_api;
mod whisper_cpp;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use podtrim_models::Transcript;
use thiserror::Error;

use crate::config::TranscriberKind;

pub use whisper_api::{WhisperApiConfig, WhisperApiTranscriber};
pub use whisper_cpp::{WhisperCppConfig, WhisperCppTranscriber};

pub type TranscriptionResult<T> = Result<T, TranscriptionError>;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Model not available: {0}")]
    ModelLoadFailed(String),

    #[error("Unreadable transcriber output: {0}")]
    InvalidOutput(String),

    #[error("Transcriber not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces an ordered, time-aligned transcript for an audio file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> TranscriptionResult<Transcript>;

    /// Name used in logs.
    fn name(&self) -> &str;

    /// Largest file the backend accepts, when it has a limit.
    fn max_upload_bytes(&self) -> Option<u64> {
        None
    }
}

/// Build the transcriber selected by `kind` from its environment config.
pub fn build_transcriber(kind: TranscriberKind) -> TranscriptionResult<Arc<dyn Transcriber>> {
    Ok(match kind {
        TranscriberKind::WhisperApi => {
            Arc::new(WhisperApiTranscriber::new(WhisperApiConfig::from_env()?)?)
        }
        TranscriberKind::WhisperCpp => {
            Arc::new(WhisperCppTranscriber::new(WhisperCppConfig::from_env()))
        }
    })
}
