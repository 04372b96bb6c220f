//! OpenAI-compatible `/audio/transcriptions` client (OpenAI, Groq).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use podtrim_models::{Transcript, TranscriptSegment};
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Transcriber, TranscriptionError, TranscriptionResult};
use crate::config::{env_first, env_parse};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Upload limit of the hosted Whisper endpoints.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WhisperApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_upload_bytes: u64,
}

impl WhisperApiConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 600,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(api_key, OPENAI_BASE_URL, "whisper-1")
    }

    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new(api_key, GROQ_BASE_URL, "whisper-large-v3")
    }

    /// Read from the environment.
    ///
    /// `GROQ_API_KEY` selects Groq defaults, otherwise `OPENAI_API_KEY` selects
    /// OpenAI. `WHISPER_API_KEY`, `WHISPER_API_BASE_URL` and `WHISPER_MODEL`
    /// override either.
    pub fn from_env() -> TranscriptionResult<Self> {
        let mut config = if let Some(key) = env_first(&["GROQ_API_KEY"]) {
            Self::groq(key)
        } else if let Some(key) = env_first(&["OPENAI_API_KEY"]) {
            Self::openai(key)
        } else {
            Self::openai(String::new())
        };

        if let Some(key) = env_first(&["WHISPER_API_KEY"]) {
            config.api_key = key;
        }
        if let Some(url) = env_first(&["WHISPER_API_BASE_URL"]) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = env_first(&["WHISPER_MODEL"]) {
            config.model = model;
        }
        if let Some(secs) = env_parse("WHISPER_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        if let Some(bytes) = env_parse("WHISPER_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes;
        }

        if config.api_key.is_empty() {
            return Err(TranscriptionError::NotConfigured(
                "set GROQ_API_KEY, OPENAI_API_KEY or WHISPER_API_KEY".to_string(),
            ));
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

impl VerboseTranscription {
    fn into_transcript(self) -> TranscriptionResult<Transcript> {
        let segments = if !self.segments.is_empty() {
            self.segments
                .into_iter()
                .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim()))
                .collect()
        } else if !self.text.trim().is_empty() {
            // Some backends ignore verbose_json and return only text
            vec![TranscriptSegment::new(0.0, self.duration.unwrap_or(0.0), self.text.trim())]
        } else {
            Vec::new()
        };
        Transcript::new(segments).map_err(|e| TranscriptionError::InvalidOutput(e.to_string()))
    }
}

pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    config: WhisperApiConfig,
}

impl WhisperApiTranscriber {
    pub fn new(config: WhisperApiConfig) -> TranscriptionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(&self, audio: &Path) -> TranscriptionResult<Transcript> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        debug!(model = %self.config.model, url = %url, "Sending audio to Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidOutput(format!("body: {}", e)))?;
        let transcript = body.into_transcript()?;

        info!(
            model = %self.config.model,
            segments = transcript.len(),
            "Whisper API transcription completed"
        );

        Ok(transcript)
    }

    fn name(&self) -> &str {
        "whisper_api"
    }

    fn max_upload_bytes(&self) -> Option<u64> {
        Some(self.config.max_upload_bytes)
    }
}
