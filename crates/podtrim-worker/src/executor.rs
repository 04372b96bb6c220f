//! Background execution of pipeline runs.
//!
//! Runs are detached tokio tasks bounded by a semaphore. Each run holds the
//! lease for its source recording, so a duplicate trigger is refused with
//! `Busy` before anything is spawned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use podtrim_media::FfmpegCodec;
use podtrim_models::RunId;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};

use crate::classifier::build_classifier;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::feed::{DownloadReport, FeedConfig, FeedDownloader};
use crate::logging::run_span;
use crate::pipeline::{ArtifactLease, ArtifactLocks, Orchestrator, PipelineSettings, RunReport};
use crate::transcription::build_transcriber;

/// What a triggered run should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineJob {
    Transcribe { source: PathBuf },
    Classify { source: PathBuf },
    /// Transcribe, then classify
    Analyze { source: PathBuf },
    /// Splice, then compress when configured
    Splice { source: PathBuf },
    /// Compress `audio`, an audio artifact derived from `source`
    Compress { source: PathBuf, audio: PathBuf },
    /// Every stage in order
    Full { source: PathBuf },
}

impl PipelineJob {
    /// Source recording the lease is keyed by.
    pub fn source(&self) -> &Path {
        match self {
            Self::Transcribe { source }
            | Self::Classify { source }
            | Self::Analyze { source }
            | Self::Splice { source }
            | Self::Compress { source, .. }
            | Self::Full { source } => source,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transcribe { .. } => "transcribe",
            Self::Classify { .. } => "classify",
            Self::Analyze { .. } => "analyze",
            Self::Splice { .. } => "splice",
            Self::Compress { .. } => "compress",
            Self::Full { .. } => "full",
        }
    }
}

/// A spawned run.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: RunId,
    pub handle: JoinHandle<PipelineResult<RunReport>>,
}

#[derive(Clone)]
pub struct PipelineRunner {
    orchestrator: Arc<Orchestrator>,
    feed: Arc<FeedDownloader>,
    locks: ArtifactLocks,
    semaphore: Arc<Semaphore>,
}

impl PipelineRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, feed: Arc<FeedDownloader>, max_concurrent_runs: usize) -> Self {
        Self {
            orchestrator,
            feed,
            locks: ArtifactLocks::new(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
        }
    }

    /// Wire the collaborators selected by `config`.
    pub fn from_config(config: &WorkerConfig) -> PipelineResult<Self> {
        let transcriber = build_transcriber(config.transcriber)?;
        let classifier = build_classifier(config.classifier)?;
        let codec = FfmpegCodec::new(config.codec_config());
        if let Err(e) = codec.check_available() {
            warn!(error = %e, "FFmpeg tools unavailable; splice and compress will fail");
        }

        let orchestrator = Orchestrator::new(
            transcriber,
            classifier,
            Arc::new(codec),
            PipelineSettings::from(config),
        );
        let feed = FeedDownloader::new(&config.library_dir, FeedConfig::from_env())?;
        Ok(Self::new(
            Arc::new(orchestrator),
            Arc::new(feed),
            config.max_concurrent_runs,
        ))
    }

    pub fn locks(&self) -> &ArtifactLocks {
        &self.locks
    }

    pub fn is_in_flight(&self, source: &Path) -> bool {
        self.locks.is_held(source)
    }

    /// Run `job` to completion on the current task.
    pub async fn run(&self, job: PipelineJob) -> PipelineResult<RunReport> {
        let lease = self.locks.try_acquire(job.source())?;
        self.execute(RunId::new(), job, lease).await
    }

    /// Schedule `job` as a detached task and return immediately.
    ///
    /// Failures are logged and counted; callers observe them only through
    /// the absence of the expected artifact.
    pub fn spawn(&self, job: PipelineJob) -> PipelineResult<RunHandle> {
        let lease = self.locks.try_acquire(job.source())?;
        let run_id = RunId::new();
        info!(run_id = %run_id, job = job.name(), source = %job.source().display(), "Run scheduled");

        let runner = self.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move { runner.execute(task_run_id, job, lease).await });
        Ok(RunHandle { run_id, handle })
    }

    async fn execute(&self, run_id: RunId, job: PipelineJob, lease: ArtifactLease) -> PipelineResult<RunReport> {
        let span = run_span(&run_id, &job.source().display().to_string());
        async move {
            let _permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::config("runner semaphore closed"))?;

            let orchestrator = &self.orchestrator;
            let result = match &job {
                PipelineJob::Transcribe { source } => {
                    orchestrator.transcribe(&run_id, source).await.map(|o| vec![o])
                }
                PipelineJob::Classify { source } => {
                    orchestrator.classify(&run_id, source).await.map(|o| vec![o])
                }
                PipelineJob::Analyze { source } => orchestrator.analyze(&run_id, source).await,
                PipelineJob::Splice { source } => orchestrator.splice_and_compress(&run_id, source).await,
                PipelineJob::Compress { audio, .. } => {
                    orchestrator.compress(&run_id, audio).await.map(|o| vec![o])
                }
                PipelineJob::Full { source } => orchestrator.run_all(&run_id, source).await,
            };
            drop(lease);

            match result {
                Ok(outcomes) => {
                    counter!("podtrim_runs_total", "job" => job.name(), "result" => "ok").increment(1);
                    info!(job = job.name(), stages = outcomes.len(), "Run finished");
                    Ok(RunReport {
                        run_id: run_id.clone(),
                        source: job.source().to_path_buf(),
                        outcomes,
                    })
                }
                Err(e) => {
                    counter!("podtrim_runs_total", "job" => job.name(), "result" => e.kind()).increment(1);
                    error!(job = job.name(), error = %e, retryable = e.is_retryable(), "Run failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Download feed episodes on the current task.
    pub async fn download(&self, url: &str, num_episodes: Option<usize>) -> PipelineResult<DownloadReport> {
        let _permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::config("runner semaphore closed"))?;
        Ok(self.feed.download(url, num_episodes).await?)
    }

    /// Schedule a feed download as a detached task.
    pub fn spawn_download(
        &self,
        url: String,
        num_episodes: Option<usize>,
    ) -> JoinHandle<PipelineResult<DownloadReport>> {
        let runner = self.clone();
        tokio::spawn(
            async move {
                let result = runner.download(&url, num_episodes).await;
                match &result {
                    Ok(report) => info!(
                        show_dir = %report.show_dir.display(),
                        downloaded = report.downloaded.len(),
                        skipped = report.skipped.len(),
                        failed = report.failed.len(),
                        "Feed download finished"
                    ),
                    Err(e) => error!(error = %e, "Feed download failed"),
                }
                result
            }
            .instrument(tracing::info_span!("feed_download")),
        )
    }
}
