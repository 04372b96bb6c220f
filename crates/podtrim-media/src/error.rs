//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during audio processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The source could not be interpreted as audio.
    #[error("Cannot decode audio: {0}")]
    InvalidAudio(String),

    #[error("No keep intervals: all content marked as advertisement")]
    NothingToKeep,

    /// A caller broke a documented contract (zero duration, negative budget).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_audio(message: impl Into<String>) -> Self {
        Self::InvalidAudio(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Whether the failure means the input itself is unusable audio.
    ///
    /// FFmpeg decode errors surface as a non-zero exit with a decoder message
    /// on stderr, so those are treated as decode failures too.
    pub fn is_decode_failure(&self) -> bool {
        match self {
            Self::InvalidAudio(_) => true,
            Self::FfprobeFailed { .. } => true,
            Self::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } => {
                let lower = stderr.to_lowercase();
                lower.contains("invalid data found when processing input")
                    || lower.contains("error while decoding")
                    || lower.contains("could not find codec parameters")
            }
            _ => false,
        }
    }
}
