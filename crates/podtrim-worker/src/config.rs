//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;

use podtrim_media::CodecConfig;
use podtrim_models::encoding::{budget_bytes_from_mb, DEFAULT_MIN_BITRATE_KBPS, DEFAULT_SIZE_BUDGET_MB};

use crate::error::{PipelineError, PipelineResult};

/// Speech-to-text backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriberKind {
    /// OpenAI-compatible `/audio/transcriptions` endpoint (OpenAI, Groq)
    WhisperApi,
    /// Local whisper.cpp `whisper-cli`
    WhisperCpp,
}

impl FromStr for TranscriberKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "whisper_api" | "api" | "openai" | "groq" => Ok(Self::WhisperApi),
            "whisper_cpp" | "whisper-cpp" | "local" => Ok(Self::WhisperCpp),
            other => Err(PipelineError::config(format!("unknown transcriber '{other}'"))),
        }
    }
}

/// Ad classification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Gemini,
    /// OpenAI-compatible chat completions (OpenRouter)
    OpenAiCompat,
}

impl FromStr for ClassifierKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai_compat" | "openai" | "openrouter" => Ok(Self::OpenAiCompat),
            other => Err(PipelineError::config(format!("unknown classifier '{other}'"))),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory holding `<show>/<episode>.mp3` files and their artifacts
    pub library_dir: PathBuf,
    /// Size budget for compressed output, in MiB
    pub size_budget_mb: f64,
    /// Lowest bitrate the planner may pick
    pub min_bitrate_kbps: u32,
    /// Maximum pipeline runs executing at once
    pub max_concurrent_runs: usize,
    /// Compress the no-ads output when it is still over budget
    pub compress_after_splice: bool,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_timeout_secs: Option<u64>,
    pub transcriber: TranscriberKind,
    pub classifier: ClassifierKind,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("podcast_downloads"),
            size_budget_mb: DEFAULT_SIZE_BUDGET_MB,
            min_bitrate_kbps: DEFAULT_MIN_BITRATE_KBPS,
            max_concurrent_runs: 2,
            compress_after_splice: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_timeout_secs: None,
            transcriber: TranscriberKind::WhisperApi,
            classifier: ClassifierKind::Gemini,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            library_dir: std::env::var("PODTRIM_LIBRARY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.library_dir),
            size_budget_mb: env_parse("PODTRIM_SIZE_BUDGET_MB").unwrap_or(defaults.size_budget_mb),
            min_bitrate_kbps: env_parse("PODTRIM_MIN_BITRATE_KBPS").unwrap_or(defaults.min_bitrate_kbps),
            max_concurrent_runs: env_parse("PODTRIM_MAX_RUNS")
                .unwrap_or(defaults.max_concurrent_runs)
                .max(1),
            compress_after_splice: env_parse("PODTRIM_COMPRESS_AFTER_SPLICE")
                .unwrap_or(defaults.compress_after_splice),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: std::env::var("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_path),
            ffmpeg_timeout_secs: env_parse("PODTRIM_FFMPEG_TIMEOUT_SECS"),
            transcriber: match std::env::var("PODTRIM_TRANSCRIBER") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.transcriber,
            },
            classifier: match std::env::var("PODTRIM_CLASSIFIER") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.classifier,
            },
        })
    }

    pub fn size_budget_bytes(&self) -> f64 {
        budget_bytes_from_mb(self.size_budget_mb)
    }

    pub fn codec_config(&self) -> CodecConfig {
        let mut config = CodecConfig::default()
            .with_ffmpeg_path(self.ffmpeg_path.clone())
            .with_ffprobe_path(self.ffprobe_path.clone());
        if let Some(secs) = self.ffmpeg_timeout_secs {
            config = config.with_timeout_secs(secs);
        }
        config
    }
}

/// Parse an environment variable, ignoring unset or malformed values.
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// First set, non-empty environment variable among `keys`.
pub(crate) fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}
