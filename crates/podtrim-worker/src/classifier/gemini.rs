//! Gemini `generateContent` classifier with model fallback.

use std::time::Duration;

use async_trait::async_trait;
use podtrim_models::{AdAnalysis, Transcript};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{build_prompt, parse_ads_response, AdClassifier, ClassificationError, ClassificationResult, SYSTEM_PROMPT};
use crate::config::{env_first, env_parse};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Tried in order until one returns a usable answer
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            models: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-flash-lite".to_string(),
            ],
            timeout_secs: 300,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Read `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) and an optional
    /// comma-separated `GEMINI_MODELS` list.
    pub fn from_env() -> ClassificationResult<Self> {
        let api_key = env_first(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]).ok_or_else(|| {
            ClassificationError::NotConfigured("GEMINI_API_KEY not set".to_string())
        })?;
        let mut config = Self::new(api_key);
        if let Some(models) = env_first(&["GEMINI_MODELS", "GEMINI_MODEL"]) {
            let models: Vec<&str> = models.split(',').map(str::trim).filter(|m| !m.is_empty()).collect();
            if !models.is_empty() {
                config = config.with_models(models);
            }
        }
        if let Some(secs) = env_parse("GEMINI_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiClassifier {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClassifier {
    pub fn new(config: GeminiConfig) -> ClassificationResult<Self> {
        if config.models.is_empty() {
            return Err(ClassificationError::NotConfigured("no Gemini models listed".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassificationError::RequestFailed(format!("client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn call_gemini_api(&self, model: &str, prompt: &str) -> ClassificationResult<AdAnalysis> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        let request = GeminiRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassificationError::RequestFailed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassificationError::RequestFailed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            ClassificationError::MalformedResponse(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ClassificationError::MalformedResponse("No content in Gemini response".to_string()))?;

        parse_ads_response(text)
    }
}

#[async_trait]
impl AdClassifier for GeminiClassifier {
    async fn classify(&self, transcript: &Transcript) -> ClassificationResult<AdAnalysis> {
        let prompt = build_prompt(transcript);
        let mut last_error = None;

        for model in &self.config.models {
            info!(model = %model, segments = transcript.len(), "Attempting Gemini classification");
            match self.call_gemini_api(model, &prompt).await {
                Ok(analysis) => {
                    info!(model = %model, ads = analysis.ads.len(), "Gemini classification succeeded");
                    return Ok(analysis);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClassificationError::RequestFailed("All Gemini models failed".to_string())))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podtrim_models::TranscriptSegment;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcript() -> Transcript {
        Transcript::new(vec![TranscriptSegment::new(0.0, 30.0, "Brought to you by Acme.")]).unwrap()
    }

    fn gemini_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        })
    }

    #[tokio::test]
    async fn test_classify_parses_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
                "```json\n{\"ads\": [{\"start_time\": 0, \"end_time\": 30, \"reason\": \"Acme\"}]}\n```",
            )))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(
            GeminiConfig::new("test-key")
                .with_base_url(server.uri())
                .with_models(["gemini-2.0-flash"]),
        )
        .unwrap();
        let analysis = classifier.classify(&transcript()).await.unwrap();

        assert_eq!(analysis.ads.len(), 1);
        assert_eq!(analysis.ads[0].reason, "Acme");
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/backup:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("{\"ads\": []}")))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(
            GeminiConfig::new("k")
                .with_base_url(server.uri())
                .with_models(["primary", "backup"]),
        )
        .unwrap();
        let analysis = classifier.classify(&transcript()).await.unwrap();

        assert!(analysis.is_empty());
    }

    #[tokio::test]
    async fn test_all_models_malformed_reports_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("{\"highlights\": []}")))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(
            GeminiConfig::new("k")
                .with_base_url(server.uri())
                .with_models(["a", "b"]),
        )
        .unwrap();
        let err = classifier.classify(&transcript()).await.unwrap_err();

        assert!(matches!(err, ClassificationError::MalformedResponse(_)));
    }

    #[test]
    fn test_empty_model_list_rejected() {
        let result = GeminiClassifier::new(GeminiConfig::new("k").with_models(Vec::<String>::new()));
        assert!(matches!(result, Err(ClassificationError::NotConfigured(_))));
    }
}
