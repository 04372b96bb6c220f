//! Advertisement analysis documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// A time range reported as advertisement content, in seconds.
///
/// Classifiers do not guarantee ordering or disjointness; consumers must
/// tolerate overlapping and unordered intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdInterval {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub reason: String,
}

impl AdInterval {
    pub fn new(start_time: f64, end_time: f64, reason: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            reason: reason.into(),
        }
    }

    /// Length in seconds, zero for inverted intervals.
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// `{"ads": [...]}` document produced by the classify stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdAnalysis {
    pub ads: Vec<AdInterval>,
}

impl AdAnalysis {
    pub fn new(ads: Vec<AdInterval>) -> Self {
        Self { ads }
    }

    /// Parse an analysis document. The `ads` key is mandatory; an empty list
    /// is a valid "no advertisements" result.
    pub fn from_json_str(raw: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Object(ref map) if map.contains_key("ads") => Ok(serde_json::from_value(value)?),
            _ => Err(ModelError::MissingAds),
        }
    }

    pub fn to_json_string(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.ads.is_empty()
    }

    /// Sum of reported ad lengths, counting overlaps twice.
    pub fn reported_secs(&self) -> f64 {
        self.ads.iter().map(AdInterval::duration_secs).sum()
    }
}
