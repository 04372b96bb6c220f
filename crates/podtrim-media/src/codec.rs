//! Audio re-encoder seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use podtrim_models::{EncodingPlan, KeepInterval};

use crate::command::FfmpegRunner;
use crate::compress::encode_audio;
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_audio_with, AudioInfo};
use crate::splice::{splice_audio, DEFAULT_MAX_INLINE_INTERVALS};

/// Decode, slice and encode whole audio files.
///
/// Implementations must write outputs atomically: `output` either does not
/// exist or is complete when a call returns.
#[async_trait]
pub trait AudioCodec: Send + Sync {
    /// Measure duration, size and native bitrate.
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo>;

    /// Decode `source` once and write the `keep` intervals, in order, to `output`.
    async fn splice(
        &self,
        source: &Path,
        keep: &[KeepInterval],
        plan: &EncodingPlan,
        output: &Path,
    ) -> MediaResult<()>;

    /// Re-encode the whole of `source` into `output`.
    async fn encode(&self, source: &Path, plan: &EncodingPlan, output: &Path) -> MediaResult<()>;
}

/// Configuration for the FFmpeg-backed codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Kill FFmpeg after this many seconds
    pub timeout_secs: Option<u64>,
    /// Keep-interval count above which the filter graph is read from a file
    pub max_inline_intervals: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            timeout_secs: None,
            max_inline_intervals: DEFAULT_MAX_INLINE_INTERVALS,
        }
    }
}

impl CodecConfig {
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = path.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_max_inline_intervals(mut self, max: usize) -> Self {
        self.max_inline_intervals = max.max(1);
        self
    }
}

/// [`AudioCodec`] driving the `ffmpeg` and `ffprobe` CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    config: CodecConfig,
    runner: FfmpegRunner,
}

impl FfmpegCodec {
    pub fn new(config: CodecConfig) -> Self {
        let mut runner = FfmpegRunner::new().with_binary(config.ffmpeg_path.clone());
        if let Some(secs) = config.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self { config, runner }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Fail fast when either binary is missing.
    pub fn check_available(&self) -> MediaResult<()> {
        which::which(&self.config.ffmpeg_path).map_err(|_| MediaError::FfmpegNotFound)?;
        which::which(&self.config.ffprobe_path).map_err(|_| MediaError::FfprobeNotFound)?;
        Ok(())
    }
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

#[async_trait]
impl AudioCodec for FfmpegCodec {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo> {
        probe_audio_with(&self.config.ffprobe_path, path).await
    }

    async fn splice(
        &self,
        source: &Path,
        keep: &[KeepInterval],
        plan: &EncodingPlan,
        output: &Path,
    ) -> MediaResult<()> {
        splice_audio(
            &self.runner,
            source,
            output,
            keep,
            plan,
            self.config.max_inline_intervals,
        )
        .await
    }

    async fn encode(&self, source: &Path, plan: &EncodingPlan, output: &Path) -> MediaResult<()> {
        encode_audio(&self.runner, source, output, plan).await
    }
}
