//! Shared data models for the podtrim pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcripts and their two on-disk shapes
//! - Advertisement analyses returned by classifiers
//! - Keep intervals and encoding plans
//! - Artifact naming and pipeline stages

pub mod analysis;
pub mod artifact;
pub mod encoding;
pub mod error;
pub mod interval;
pub mod stage;
pub mod transcript;

// Re-export common types
pub use analysis::{AdAnalysis, AdInterval};
pub use artifact::{ArtifactKind, ArtifactPaths};
pub use encoding::EncodingPlan;
pub use error::{ModelError, ModelResult};
pub use interval::KeepInterval;
pub use stage::{ArtifactStatus, RunId, Stage};
pub use transcript::{Transcript, TranscriptSegment};
