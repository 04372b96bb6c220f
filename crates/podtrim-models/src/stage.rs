//! Pipeline stages, run identifiers and per-source status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one triggered pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcribe,
    Classify,
    Splice,
    Compress,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcribe => "transcribe",
            Stage::Classify => "classify",
            Stage::Splice => "splice",
            Stage::Compress => "compress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which derived artifacts exist for a source recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    /// Source path relative to the library root
    pub source: String,
    pub source_exists: bool,
    pub transcript: bool,
    pub analysis: bool,
    pub no_ads: bool,
    pub compressed: bool,
    /// A run for this source is currently executing
    pub in_flight: bool,
    /// Stage that would do work next, given the artifacts above
    pub next_stage: Option<Stage>,
    pub checked_at: DateTime<Utc>,
}

impl ArtifactStatus {
    /// Next stage that would do work, if any.
    pub fn pending_stage(&self) -> Option<Stage> {
        if !self.source_exists {
            None
        } else if !self.transcript {
            Some(Stage::Transcribe)
        } else if !self.analysis {
            Some(Stage::Classify)
        } else if !self.no_ads {
            Some(Stage::Splice)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> ArtifactStatus {
        ArtifactStatus {
            source: "Show/ep.mp3".to_string(),
            source_exists: true,
            transcript: false,
            analysis: false,
            no_ads: false,
            compressed: false,
            in_flight: false,
            next_stage: None,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_stage_follows_artifacts() {
        let mut s = status();
        assert_eq!(s.pending_stage(), Some(Stage::Transcribe));
        s.transcript = true;
        assert_eq!(s.pending_stage(), Some(Stage::Classify));
        s.analysis = true;
        assert_eq!(s.pending_stage(), Some(Stage::Splice));
        s.no_ads = true;
        assert_eq!(s.pending_stage(), None);
    }

    #[test]
    fn test_stage_serde() {
        assert_eq!(serde_json::to_string(&Stage::Classify).unwrap(), "\"classify\"");
        assert_eq!(Stage::Splice.to_string(), "splice");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
