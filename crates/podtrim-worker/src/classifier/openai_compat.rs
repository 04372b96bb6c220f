//! OpenAI-compatible chat completions classifier (OpenRouter by default).

use std::time::Duration;

use async_trait::async_trait;
use podtrim_models::{AdAnalysis, Transcript};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{build_prompt, parse_ads_response, AdClassifier, ClassificationError, ClassificationResult, SYSTEM_PROMPT};
use crate::config::{env_first, env_parse};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OpenAiCompatConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 600,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Read `OPENROUTER_API_KEY`, `AI_MODEL_NAME` and `AI_BASE_URL`.
    pub fn from_env() -> ClassificationResult<Self> {
        let api_key = env_first(&["OPENROUTER_API_KEY", "AI_API_KEY"]).ok_or_else(|| {
            ClassificationError::NotConfigured("OPENROUTER_API_KEY not set".to_string())
        })?;
        let mut config = Self::new(api_key);
        if let Some(model) = env_first(&["AI_MODEL_NAME"]) {
            config.model = model;
        }
        if let Some(url) = env_first(&["AI_BASE_URL"]) {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = env_parse("AI_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatClassifier {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatClassifier {
    pub fn new(config: OpenAiCompatConfig) -> ClassificationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassificationError::RequestFailed(format!("client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AdClassifier for OpenAiCompatClassifier {
    async fn classify(&self, transcript: &Transcript) -> ClassificationResult<AdAnalysis> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let prompt = build_prompt(transcript);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        debug!(model = %self.config.model, url = %url, "Sending transcript for classification");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassificationError::RequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::RequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::MalformedResponse(format!("body: {}", e)))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassificationError::MalformedResponse("empty completion".to_string()))?;

        let analysis = parse_ads_response(&content)?;
        info!(model = %self.config.model, ads = analysis.ads.len(), "Classification completed");
        Ok(analysis)
    }

    fn name(&self) -> &str {
        "openai_compat"
    }
}
