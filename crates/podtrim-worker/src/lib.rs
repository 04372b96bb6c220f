//! Podcast ad-removal pipeline.
//!
//! This crate provides:
//! - Transcription and ad-classification collaborators
//! - The stage orchestrator and its background runner
//! - RSS feed downloading
//! - Library listing and artifact name resolution

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod feed;
pub mod logging;
pub mod pipeline;
pub mod transcription;

pub use catalog::Catalog;
pub use classifier::{AdClassifier, ClassificationError};
pub use config::{ClassifierKind, TranscriberKind, WorkerConfig};
pub use error::{PipelineError, PipelineResult};
pub use executor::{PipelineJob, PipelineRunner, RunHandle};
pub use feed::{FeedConfig, FeedDownloader};
pub use logging::StageLogger;
pub use pipeline::{ArtifactLocks, Orchestrator, PipelineSettings, RunReport, StageOutcome};
pub use transcription::{Transcriber, TranscriptionError};
