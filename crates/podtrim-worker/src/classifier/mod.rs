//! Advertisement classification collaborators.
//!
//! A classifier receives the whole transcript, one `[start - end] text` line
//! per segment, and must answer with a single JSON object
//! `{"ads": [{"start_time", "end_time", "reason"}]}`.

mod gemini;
mod openai_compat;

use std::sync::Arc;

use async_trait::async_trait;
use podtrim_models::{AdAnalysis, Transcript};
use thiserror::Error;

use crate::config::ClassifierKind;

pub use gemini::{GeminiClassifier, GeminiConfig};
pub use openai_compat::{OpenAiCompatClassifier, OpenAiCompatConfig};

pub type ClassificationResult<T> = Result<T, ClassificationError>;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Classifier request failed: {0}")]
    RequestFailed(String),

    /// Non-JSON, or JSON without an `ads` key.
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("Classifier not configured: {0}")]
    NotConfigured(String),
}

#[async_trait]
pub trait AdClassifier: Send + Sync {
    /// Report the advertisement intervals found in `transcript`.
    async fn classify(&self, transcript: &Transcript) -> ClassificationResult<AdAnalysis>;

    fn name(&self) -> &str;
}

/// Instructions sent ahead of the transcript.
pub const SYSTEM_PROMPT: &str = "You are a professional podcast analyst. Your only task is to \
find the advertisement segments in the transcript the user provides and answer with pure JSON.";

/// Build the user prompt for `transcript`.
pub fn build_prompt(transcript: &Transcript) -> String {
    format!(
        r#"Your reply MUST be a single JSON object with exactly one key, "ads", whose value is an array.
Each element describes one advertisement segment with "start_time" (seconds), "end_time" (seconds)
and "reason" (a short explanation, e.g. the sponsor).
If there are no advertisements, "ads" MUST be an empty array: {{"ads": []}}

EXAMPLE OUTPUT:
{{
  "ads": [
    {{
      "start_time": 1.50,
      "end_time": 97.00,
      "reason": "Sponsored by Acme, introducing new home appliances."
    }}
  ]
}}

Use the timestamps exactly as they appear in the transcript.

TRANSCRIPT:
{}
"#,
        transcript.to_prompt_text()
    )
}

/// Remove a surrounding Markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse a classifier reply into an [`AdAnalysis`].
///
/// Falls back to the outermost `{...}` span for models that wrap the object
/// in prose or reasoning output.
pub fn parse_ads_response(raw: &str) -> ClassificationResult<AdAnalysis> {
    let text = strip_code_fences(raw);
    match AdAnalysis::from_json_str(text) {
        Ok(analysis) => Ok(analysis),
        Err(first_err) => {
            let inner = match (text.find('{'), text.rfind('}')) {
                (Some(start), Some(end)) if start < end => &text[start..=end],
                _ => return Err(ClassificationError::MalformedResponse(first_err.to_string())),
            };
            if inner.len() == text.len() {
                return Err(ClassificationError::MalformedResponse(first_err.to_string()));
            }
            AdAnalysis::from_json_str(inner)
                .map_err(|e| ClassificationError::MalformedResponse(e.to_string()))
        }
    }
}

/// Build the classifier selected by `kind` from its environment config.
pub fn build_classifier(kind: ClassifierKind) -> ClassificationResult<Arc<dyn AdClassifier>> {
    Ok(match kind {
        ClassifierKind::Gemini => Arc::new(GeminiClassifier::new(GeminiConfig::from_env()?)?),
        ClassifierKind::OpenAiCompat => {
            Arc::new(OpenAiCompatClassifier::new(OpenAiCompatConfig::from_env()?)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use podtrim_models::TranscriptSegment;

    #[test]
    fn test_prompt_lists_segments() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(0.0, 4.25, " Welcome back "),
            TranscriptSegment::new(4.25, 30.0, "This show is brought to you by Acme."),
        ])
        .unwrap();
        let prompt = build_prompt(&transcript);

        assert!(prompt.contains("[0.00s - 4.25s] Welcome back\n[4.25s - 30.00s] This show is brought to you by Acme."));
        assert!(prompt.contains(r#"{"ads": []}"#));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"ads\": []}\n```"), "{\"ads\": []}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"ads\": []} "), "{\"ads\": []}");
    }

    #[test]
    fn test_parse_fenced_response() {
        let analysis = parse_ads_response(
            "```json\n{\"ads\": [{\"start_time\": 10, \"end_time\": 20, \"reason\": \"x\"}]}\n```",
        )
        .unwrap();
        assert_eq!(analysis.ads.len(), 1);
        assert_eq!(analysis.ads[0].end_time, 20.0);
    }

    #[test]
    fn test_parse_object_wrapped_in_prose() {
        let analysis =
            parse_ads_response("<think>looking for sponsors</think>\nResult: {\"ads\": []}").unwrap();
        assert!(analysis.is_empty());
    }

    #[test]
    fn test_missing_ads_key_is_malformed() {
        let err = parse_ads_response("{\"segments\": []}").unwrap_err();
        assert!(matches!(err, ClassificationError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = parse_ads_response("I could not find any advertisements.").unwrap_err();
        assert!(matches!(err, ClassificationError::MalformedResponse(_)));
    }
}
