//! Time-aligned transcripts.
//!
//! Two document shapes are accepted on disk:
//! - a flat array of `{start, end, text}` objects with times in seconds
//! - an object with a `transcription` list of `{offsets: {from, to}, text}`
//!   entries with times in milliseconds (whisper.cpp `-oj` output)
//!
//! Both are normalised into one [`Transcript`] of [`TranscriptSegment`]s. The
//! flat shape is the one written back to disk.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// A single recognised utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Render as one classification prompt line.
    pub fn prompt_line(&self) -> String {
        format!("[{:.2}s - {:.2}s] {}", self.start, self.end, self.text.trim())
    }
}

#[derive(Debug, Deserialize)]
struct NestedTranscript {
    transcription: Vec<NestedSegment>,
}

#[derive(Debug, Deserialize)]
struct NestedSegment {
    offsets: NestedOffsets,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct NestedOffsets {
    from: u64,
    to: u64,
}

/// Ordered transcript, chronological by segment start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Build a transcript from collaborator output.
    ///
    /// Segments are stably sorted by start time. An end before its start is
    /// raised to the start; negative or non-finite times are rejected.
    pub fn new(mut segments: Vec<TranscriptSegment>) -> ModelResult<Self> {
        for (index, segment) in segments.iter_mut().enumerate() {
            if !segment.start.is_finite() || !segment.end.is_finite() {
                return Err(ModelError::invalid_segment(index, "non-finite time"));
            }
            if segment.start < 0.0 {
                return Err(ModelError::invalid_segment(index, "negative start"));
            }
            if segment.end < segment.start {
                segment.end = segment.start;
            }
        }
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(Self { segments })
    }

    /// Parse either supported document shape, chosen by the top-level JSON value.
    pub fn from_json_str(raw: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Array(_) => Self::from_flat(value),
            Value::Object(ref map) if map.contains_key("transcription") => Self::from_nested(value),
            Value::Object(_) => Err(ModelError::UnrecognizedTranscript(
                "object without a 'transcription' list".to_string(),
            )),
            other => Err(ModelError::UnrecognizedTranscript(format!(
                "top-level {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_flat(value: Value) -> ModelResult<Self> {
        let segments: Vec<TranscriptSegment> = serde_json::from_value(value)?;
        Self::new(segments)
    }

    fn from_nested(value: Value) -> ModelResult<Self> {
        let nested: NestedTranscript = serde_json::from_value(value)?;
        let segments = nested
            .transcription
            .into_iter()
            .map(|s| {
                TranscriptSegment::new(
                    s.offsets.from as f64 / 1000.0,
                    s.offsets.to as f64 / 1000.0,
                    s.text,
                )
            })
            .collect();
        Self::new(segments)
    }

    /// Serialize in the flat shape.
    pub fn to_json_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(&self.segments)?)
    }

    /// Concatenated text handed to the ad classifier, one line per segment.
    pub fn to_prompt_text(&self) -> String {
        self.segments
            .iter()
            .map(TranscriptSegment::prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Latest segment end, in seconds.
    pub fn span_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.end).fold(0.0, f64::max)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
