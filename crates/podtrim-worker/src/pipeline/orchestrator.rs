//! Stage machine driving one source recording to its final artifacts.
//!
//! State lives only on disk: each stage checks for its output before doing
//! any work, and writes that output atomically once fully computed. A failed
//! stage leaves nothing behind, so re-invoking it retries exactly that stage.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use podtrim_media::{complement, exceeds_budget, fs_utils, is_identity, keep_stats, plan, AudioCodec};
use podtrim_models::encoding::{budget_bytes_from_mb, DEFAULT_MIN_BITRATE_KBPS, DEFAULT_SIZE_BUDGET_MB, FALLBACK_BITRATE_KBPS};
use podtrim_models::{AdAnalysis, ArtifactKind, ArtifactPaths, EncodingPlan, RunId, Stage, Transcript};

use super::stage::StageOutcome;
use crate::catalog::{file_kind, first_existing};
use crate::classifier::AdClassifier;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StageLogger;
use crate::transcription::Transcriber;

/// Tunables for the splice and compress stages.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub size_budget_bytes: f64,
    pub min_bitrate_kbps: u32,
    /// Compress the no-ads file after splicing when it exceeds the budget
    pub compress_after_splice: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            size_budget_bytes: budget_bytes_from_mb(DEFAULT_SIZE_BUDGET_MB),
            min_bitrate_kbps: DEFAULT_MIN_BITRATE_KBPS,
            compress_after_splice: false,
        }
    }
}

impl From<&WorkerConfig> for PipelineSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            size_budget_bytes: config.size_budget_bytes(),
            min_bitrate_kbps: config.min_bitrate_kbps,
            compress_after_splice: config.compress_after_splice,
        }
    }
}

pub struct Orchestrator {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn AdClassifier>,
    codec: Arc<dyn AudioCodec>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn AdClassifier>,
        codec: Arc<dyn AudioCodec>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transcriber,
            classifier,
            codec,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Transcribe `source` into `<name>.mp3.json`.
    pub async fn transcribe(&self, run_id: &RunId, source: &Path) -> PipelineResult<StageOutcome> {
        let logger = StageLogger::new(run_id, Stage::Transcribe, source.display().to_string());
        self.observe(&logger, self.run_transcribe(run_id, &logger, source)).await
    }

    /// Classify the transcript of `source` into `<name>.mp3.analysis.json`.
    pub async fn classify(&self, run_id: &RunId, source: &Path) -> PipelineResult<StageOutcome> {
        let logger = StageLogger::new(run_id, Stage::Classify, source.display().to_string());
        self.observe(&logger, self.run_classify(&logger, source)).await
    }

    /// Cut the advertisements listed in the analysis of `source` into `<name>_no_ads.mp3`.
    pub async fn splice(&self, run_id: &RunId, source: &Path) -> PipelineResult<StageOutcome> {
        let logger = StageLogger::new(run_id, Stage::Splice, source.display().to_string());
        self.observe(&logger, self.run_splice(&logger, source)).await
    }

    /// Re-encode `audio` into `<name>.compressed.mp3` when it exceeds the size budget.
    pub async fn compress(&self, run_id: &RunId, audio: &Path) -> PipelineResult<StageOutcome> {
        self.compress_with_budget(run_id, audio, self.settings.size_budget_bytes)
            .await
    }

    async fn compress_with_budget(
        &self,
        run_id: &RunId,
        audio: &Path,
        budget_bytes: f64,
    ) -> PipelineResult<StageOutcome> {
        let logger = StageLogger::new(run_id, Stage::Compress, audio.display().to_string());
        self.observe(&logger, self.run_compress(&logger, audio, budget_bytes))
            .await
    }

    /// Transcribe, then classify.
    pub async fn analyze(&self, run_id: &RunId, source: &Path) -> PipelineResult<Vec<StageOutcome>> {
        let transcribed = self.transcribe(run_id, source).await?;
        let classified = self.classify(run_id, source).await?;
        Ok(vec![transcribed, classified])
    }

    /// Splice, then compress the spliced file when enabled and still oversized.
    pub async fn splice_and_compress(
        &self,
        run_id: &RunId,
        source: &Path,
    ) -> PipelineResult<Vec<StageOutcome>> {
        let spliced = self.splice(run_id, source).await?;
        let mut outcomes = Vec::with_capacity(2);
        let no_ads = spliced.artifact().map(Path::to_path_buf);
        outcomes.push(spliced);

        if self.settings.compress_after_splice {
            if let Some(no_ads) = no_ads {
                outcomes.push(self.compress(run_id, &no_ads).await?);
            }
        }
        Ok(outcomes)
    }

    /// Every stage in order, stopping at the first failure.
    pub async fn run_all(&self, run_id: &RunId, source: &Path) -> PipelineResult<Vec<StageOutcome>> {
        let mut outcomes = self.analyze(run_id, source).await?;
        outcomes.extend(self.splice_and_compress(run_id, source).await?);
        Ok(outcomes)
    }

    async fn observe<F>(&self, logger: &StageLogger, stage: F) -> PipelineResult<StageOutcome>
    where
        F: Future<Output = PipelineResult<StageOutcome>>,
    {
        let started = Instant::now();
        let result = stage.await;
        let outcome = match &result {
            Ok(outcome) => outcome.label(),
            Err(e) => e.kind(),
        };

        counter!("podtrim_stage_runs_total", "stage" => logger.stage(), "outcome" => outcome)
            .increment(1);
        histogram!("podtrim_stage_duration_seconds", "stage" => logger.stage())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(done @ StageOutcome::Completed { .. }) => logger.log_completion(&done.to_string()),
            Ok(other) => logger.log_skipped(&other.to_string()),
            Err(PipelineError::EmptyResult(msg)) => logger.log_warning(msg),
            Err(e) => logger.log_error(&e.to_string()),
        }
        result
    }

    async fn run_transcribe(
        &self,
        run_id: &RunId,
        logger: &StageLogger,
        source: &Path,
    ) -> PipelineResult<StageOutcome> {
        let paths = ArtifactPaths::for_source(source);
        require_file(&paths.source).await?;
        if fs_utils::file_exists(&paths.transcript).await {
            return Ok(StageOutcome::Skipped {
                stage: Stage::Transcribe,
                existing: paths.transcript,
            });
        }

        logger.log_start(&format!("transcribing with {}", self.transcriber.name()));

        let mut input = paths.source.clone();
        if let Some(limit) = self.transcriber.max_upload_bytes() {
            let size = fs_utils::file_size(&paths.source).await?;
            if size > limit {
                logger.log_progress(&format!(
                    "source is {size} bytes, over the {limit} byte upload limit; using a compressed copy"
                ));
                let budget = (limit as f64).min(self.settings.size_budget_bytes);
                let compressed = self
                    .compress_with_budget(run_id, &paths.source, budget)
                    .await?
                    .artifact()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| {
                        PipelineError::precondition("compression produced no artifact for upload")
                    })?;
                let compressed_size = fs_utils::file_size(&compressed).await?;
                if compressed_size > limit {
                    return Err(PipelineError::precondition(format!(
                        "{} is {compressed_size} bytes, still over the {limit} byte upload limit",
                        compressed.display()
                    )));
                }
                input = compressed;
            }
        }

        let transcript = self.transcriber.transcribe(&input).await?;
        if transcript.is_empty() {
            return Err(PipelineError::empty_result("no speech recognised"));
        }
        logger.log_progress(&format!(
            "{} segments spanning {:.1}s",
            transcript.len(),
            transcript.span_secs()
        ));

        fs_utils::write_atomic(&paths.transcript, transcript.to_json_string()?).await?;
        Ok(StageOutcome::Completed {
            stage: Stage::Transcribe,
            output: paths.transcript,
        })
    }

    async fn run_classify(&self, logger: &StageLogger, source: &Path) -> PipelineResult<StageOutcome> {
        let paths = ArtifactPaths::for_source(source);
        if let Some(existing) = first_existing(&paths.analysis_candidates()).await {
            return Ok(StageOutcome::Skipped {
                stage: Stage::Classify,
                existing: existing.to_path_buf(),
            });
        }
        require_file(&paths.transcript).await?;

        let raw = tokio::fs::read_to_string(&paths.transcript).await?;
        let transcript = Transcript::from_json_str(&raw)?;
        logger.log_start(&format!(
            "classifying {} segments with {}",
            transcript.len(),
            self.classifier.name()
        ));

        let analysis = self.classifier.classify(&transcript).await?;
        logger.log_progress(&format!(
            "{} ads reported, {:.1}s in total",
            analysis.ads.len(),
            analysis.reported_secs()
        ));

        fs_utils::write_atomic(&paths.analysis, analysis.to_json_string()?).await?;
        Ok(StageOutcome::Completed {
            stage: Stage::Classify,
            output: paths.analysis,
        })
    }

    async fn run_splice(&self, logger: &StageLogger, source: &Path) -> PipelineResult<StageOutcome> {
        let paths = ArtifactPaths::for_source(source);
        require_file(&paths.source).await?;
        let analysis_path = first_existing(&paths.analysis_candidates())
            .await
            .map(Path::to_path_buf)
            .ok_or_else(|| PipelineError::not_found(&paths.analysis))?;
        if fs_utils::file_exists(&paths.no_ads).await {
            return Ok(StageOutcome::Skipped {
                stage: Stage::Splice,
                existing: paths.no_ads,
            });
        }

        let raw = tokio::fs::read_to_string(&analysis_path).await?;
        let analysis = AdAnalysis::from_json_str(&raw)?;
        if analysis.is_empty() {
            return Ok(StageOutcome::NoAds {
                analysis: analysis_path,
            });
        }

        let info = self.codec.probe(&paths.source).await?;
        let total_ms = info.duration_ms();
        let keep = complement(&analysis.ads, total_ms);
        if keep.is_empty() {
            return Err(PipelineError::empty_result("all content marked as advertisement"));
        }
        if is_identity(&keep, total_ms) {
            return Ok(StageOutcome::NoAds {
                analysis: analysis_path,
            });
        }

        let stats = keep_stats(&keep, total_ms);
        logger.log_start(&format!(
            "keeping {} intervals, removing {:.1}s of {:.1}s",
            stats.keep_count,
            stats.removed_ms as f64 / 1000.0,
            total_ms as f64 / 1000.0
        ));

        // Splicing only removes content; the encode keeps the native bitrate
        let plan = EncodingPlan::new(info.bitrate_kbps().unwrap_or(FALLBACK_BITRATE_KBPS));
        self.codec.splice(&paths.source, &keep, &plan, &paths.no_ads).await?;

        Ok(StageOutcome::Completed {
            stage: Stage::Splice,
            output: paths.no_ads,
        })
    }

    async fn run_compress(
        &self,
        logger: &StageLogger,
        audio: &Path,
        budget_bytes: f64,
    ) -> PipelineResult<StageOutcome> {
        if file_kind(audio) == Some(ArtifactKind::Compressed) {
            return Err(PipelineError::precondition(format!(
                "{} is already a compressed artifact",
                audio.display()
            )));
        }
        require_file(audio).await?;

        let paths = ArtifactPaths::for_source(audio);
        if let Some(existing) = first_existing(&paths.compressed_candidates()).await {
            return Ok(StageOutcome::Skipped {
                stage: Stage::Compress,
                existing: existing.to_path_buf(),
            });
        }

        let size_bytes = fs_utils::file_size(audio).await?;
        if !exceeds_budget(size_bytes, budget_bytes) {
            return Ok(StageOutcome::WithinBudget {
                input: audio.to_path_buf(),
                size_bytes,
            });
        }

        let info = self.codec.probe(audio).await?;
        let plan = plan(budget_bytes, info.duration, self.settings.min_bitrate_kbps)?;
        logger.log_start(&format!(
            "{size_bytes} bytes over a {budget_bytes:.0} byte budget; encoding {:.1}s at {} (about {} bytes)",
            info.duration,
            plan.bitrate_arg(),
            plan.estimated_bytes(info.duration)
        ));

        self.codec.encode(audio, &plan, &paths.compressed).await?;
        Ok(StageOutcome::Completed {
            stage: Stage::Compress,
            output: paths.compressed,
        })
    }
}

async fn require_file(path: &Path) -> PipelineResult<()> {
    if fs_utils::file_exists(path).await {
        Ok(())
    } else {
        Err(PipelineError::not_found(path))
    }
}
