//! Structured stage logging.
//!
//! Every pipeline lifecycle line carries the run ID, the stage and the
//! artifact it concerns, so a single run can be followed in JSON logs.

use tracing::{error, info, warn, Span};

use podtrim_models::{RunId, Stage};

/// Logger for one stage of one pipeline run.
#[derive(Debug, Clone)]
pub struct StageLogger {
    run_id: String,
    stage: &'static str,
    artifact: String,
}

impl StageLogger {
    pub fn new(run_id: &RunId, stage: Stage, artifact: impl Into<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.as_str(),
            artifact: artifact.into(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage progress: {}", message
        );
    }

    /// Log a stage that found its output already present.
    pub fn log_skipped(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage skipped: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = self.stage,
            artifact = %self.artifact,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }
}

/// Span covering a whole pipeline run.
pub fn run_span(run_id: &RunId, artifact: &str) -> Span {
    tracing::info_span!("pipeline_run", run_id = %run_id, artifact = %artifact)
}
