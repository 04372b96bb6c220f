//! Stage pipeline.

mod locks;
mod orchestrator;
mod stage;

pub use locks::{ArtifactLease, ArtifactLocks};
pub use orchestrator::{Orchestrator, PipelineSettings};
pub use stage::{RunReport, StageOutcome};
