//! Stage outcomes and run reports.

use std::fmt;
use std::path::{Path, PathBuf};

use podtrim_models::{RunId, Stage};
use serde::Serialize;

/// Result of one stage that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage wrote `output`.
    Completed { stage: Stage, output: PathBuf },
    /// `existing` was already present; nothing was done.
    Skipped { stage: Stage, existing: PathBuf },
    /// The analysis lists no advertisements within the recording.
    NoAds { analysis: PathBuf },
    /// `input` already fits the size budget.
    WithinBudget { input: PathBuf, size_bytes: u64 },
}

impl StageOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed { stage, .. } | Self::Skipped { stage, .. } => *stage,
            Self::NoAds { .. } => Stage::Splice,
            Self::WithinBudget { .. } => Stage::Compress,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Skipped { .. } => "skipped",
            Self::NoAds { .. } => "no_ads",
            Self::WithinBudget { .. } => "within_budget",
        }
    }

    /// The artifact this stage leaves for the next one, if any.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Completed { output, .. } => Some(output),
            Self::Skipped { existing, .. } => Some(existing),
            Self::NoAds { .. } | Self::WithinBudget { .. } => None,
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { stage, output } => write!(f, "{stage}: wrote {}", output.display()),
            Self::Skipped { stage, existing } => {
                write!(f, "{stage}: skipped, {} already exists", existing.display())
            }
            Self::NoAds { analysis } => {
                write!(f, "splice: no advertisements listed in {}", analysis.display())
            }
            Self::WithinBudget { input, size_bytes } => write!(
                f,
                "compress: {} is {} bytes, within budget",
                input.display(),
                size_bytes
            ),
        }
    }
}

/// Outcomes of one triggered run, in stage order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub source: PathBuf,
    pub outcomes: Vec<StageOutcome>,
}

impl RunReport {
    pub fn new(run_id: RunId, source: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            source: source.into(),
            outcomes: Vec::new(),
        }
    }

    /// Last artifact produced or found by the run.
    pub fn final_artifact(&self) -> Option<&Path> {
        self.outcomes.iter().rev().find_map(StageOutcome::artifact)
    }
}
