//! Local whisper.cpp transcription via `whisper-cli -oj`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use podtrim_models::Transcript;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Transcriber, TranscriptionError, TranscriptionResult};
use crate::config::env_first;

#[derive(Debug, Clone)]
pub struct WhisperCppConfig {
    /// `whisper-cli` executable
    pub binary: PathBuf,
    /// ggml model file, e.g. `models/ggml-base.bin`
    pub model_path: PathBuf,
    /// Spoken language, `auto` to detect
    pub language: String,
}

impl Default for WhisperCppConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("whisper-cli"),
            model_path: model_path_for("models", "base"),
            language: "auto".to_string(),
        }
    }
}

impl WhisperCppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let model_path = match env_first(&["WHISPER_CPP_MODEL"]) {
            Some(path) => PathBuf::from(path),
            None => model_path_for(
                env_first(&["WHISPER_CPP_MODELS_DIR"]).unwrap_or_else(|| "models".to_string()),
                &env_first(&["WHISPER_CPP_MODEL_SIZE"]).unwrap_or_else(|| "base".to_string()),
            ),
        };
        Self {
            binary: env_first(&["WHISPER_CPP_BIN"])
                .map(PathBuf::from)
                .unwrap_or(defaults.binary),
            model_path,
            language: env_first(&["WHISPER_CPP_LANGUAGE"]).unwrap_or(defaults.language),
        }
    }
}

/// `<dir>/ggml-<size>.bin`
pub fn model_path_for(dir: impl AsRef<Path>, size: &str) -> PathBuf {
    dir.as_ref().join(format!("ggml-{size}.bin"))
}

pub struct WhisperCppTranscriber {
    config: WhisperCppConfig,
}

impl WhisperCppTranscriber {
    pub fn new(config: WhisperCppConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, audio: &Path, output_base: &Path) -> Vec<String> {
        vec![
            "-m".to_string(),
            self.config.model_path.to_string_lossy().into_owned(),
            "-f".to_string(),
            audio.to_string_lossy().into_owned(),
            "-l".to_string(),
            self.config.language.clone(),
            "-oj".to_string(),
            "-of".to_string(),
            output_base.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl Transcriber for WhisperCppTranscriber {
    async fn transcribe(&self, audio: &Path) -> TranscriptionResult<Transcript> {
        let binary = which::which(&self.config.binary).map_err(|_| {
            TranscriptionError::NotConfigured(format!(
                "whisper.cpp executable '{}' not found",
                self.config.binary.display()
            ))
        })?;
        if !self.config.model_path.exists() {
            return Err(TranscriptionError::ModelLoadFailed(format!(
                "model file '{}' not found",
                self.config.model_path.display()
            )));
        }

        // whisper-cli appends `.json` to the -of base
        let work_dir = tempfile::tempdir()?;
        let output_base = work_dir.path().join("transcript");
        let args = self.build_args(audio, &output_base);
        debug!(binary = %binary.display(), args = ?args, "Running whisper.cpp");

        let output = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(10).collect();
            return Err(TranscriptionError::TranscriptionFailed(format!(
                "whisper.cpp exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            )));
        }

        let json_path = output_base.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            TranscriptionError::InvalidOutput(format!("{}: {}", json_path.display(), e))
        })?;
        let transcript = Transcript::from_json_str(&raw)
            .map_err(|e| TranscriptionError::InvalidOutput(e.to_string()))?;

        info!(segments = transcript.len(), "whisper.cpp transcription completed");
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "whisper_cpp"
    }
}
