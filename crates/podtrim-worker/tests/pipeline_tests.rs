//! Stage machine tests against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use podtrim_media::{fs_utils, AudioCodec, AudioInfo, MediaResult};
use podtrim_models::{
    AdAnalysis, AdInterval, ArtifactPaths, EncodingPlan, KeepInterval, RunId, Stage, Transcript,
    TranscriptSegment,
};
use podtrim_worker::classifier::{ClassificationError, ClassificationResult};
use podtrim_worker::transcription::TranscriptionResult;
use podtrim_worker::{
    AdClassifier, ArtifactLocks, Orchestrator, PipelineError, PipelineSettings, StageOutcome,
    Transcriber,
};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct FakeTranscriber {
    segments: Vec<TranscriptSegment>,
    max_upload_bytes: Option<u64>,
    calls: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path) -> TranscriptionResult<Transcript> {
        self.calls.lock().unwrap().push(audio.to_path_buf());
        Ok(Transcript::new(self.segments.clone()).unwrap())
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn max_upload_bytes(&self) -> Option<u64> {
        self.max_upload_bytes
    }
}

enum ClassifierReply {
    Ads(Vec<AdInterval>),
    Malformed,
}

struct FakeClassifier {
    reply: ClassifierReply,
}

#[async_trait]
impl AdClassifier for FakeClassifier {
    async fn classify(&self, _transcript: &Transcript) -> ClassificationResult<AdAnalysis> {
        match &self.reply {
            ClassifierReply::Ads(ads) => Ok(AdAnalysis::new(ads.clone())),
            ClassifierReply::Malformed => Err(ClassificationError::MalformedResponse(
                "expected an 'ads' list".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeCodec {
    duration: f64,
    bitrate: u64,
    output_bytes: usize,
    spliced: Mutex<Vec<Vec<KeepInterval>>>,
    splice_plans: Mutex<Vec<EncodingPlan>>,
    encoded: Mutex<Vec<EncodingPlan>>,
}

impl FakeCodec {
    fn new(duration: f64) -> Self {
        Self::with_bitrate(duration, 128_000)
    }

    fn with_bitrate(duration: f64, bitrate: u64) -> Self {
        Self {
            duration,
            bitrate,
            output_bytes: 16,
            spliced: Mutex::new(Vec::new()),
            splice_plans: Mutex::new(Vec::new()),
            encoded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AudioCodec for FakeCodec {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo> {
        Ok(AudioInfo {
            duration: self.duration,
            size: fs_utils::file_size(path).await?,
            bitrate: self.bitrate,
            codec: "mp3".to_string(),
            sample_rate: 44_100,
            channels: 2,
        })
    }

    async fn splice(
        &self,
        _source: &Path,
        keep: &[KeepInterval],
        plan: &EncodingPlan,
        output: &Path,
    ) -> MediaResult<()> {
        self.spliced.lock().unwrap().push(keep.to_vec());
        self.splice_plans.lock().unwrap().push(plan.clone());
        fs_utils::write_atomic(output, vec![0u8; self.output_bytes]).await
    }

    async fn encode(&self, _source: &Path, plan: &EncodingPlan, output: &Path) -> MediaResult<()> {
        self.encoded.lock().unwrap().push(plan.clone());
        fs_utils::write_atomic(output, vec![0u8; self.output_bytes]).await
    }
}

struct Fixture {
    _dir: TempDir,
    source: PathBuf,
    transcriber: Arc<FakeTranscriber>,
    codec: Arc<FakeCodec>,
    orchestrator: Orchestrator,
}

fn segments() -> Vec<TranscriptSegment> {
    vec![
        TranscriptSegment::new(0.0, 10.0, "Welcome back to the show."),
        TranscriptSegment::new(10.0, 25.0, "This episode is brought to you by Acme."),
        TranscriptSegment::new(25.0, 30.0, "Now, back to the interview."),
    ]
}

async fn fixture(
    transcriber: FakeTranscriber,
    reply: ClassifierReply,
    codec: FakeCodec,
    settings: PipelineSettings,
) -> Fixture {
    let dir = TempDir::new().unwrap();
    let show = dir.path().join("Show");
    tokio::fs::create_dir_all(&show).await.unwrap();
    let source = show.join("2024-01-01_Episode.mp3");
    tokio::fs::write(&source, vec![1u8; 512]).await.unwrap();

    let transcriber = Arc::new(transcriber);
    let codec = Arc::new(codec);
    let orchestrator = Orchestrator::new(
        transcriber.clone(),
        Arc::new(FakeClassifier { reply }),
        codec.clone(),
        settings,
    );
    Fixture {
        _dir: dir,
        source,
        transcriber,
        codec,
        orchestrator,
    }
}

fn default_transcriber() -> FakeTranscriber {
    FakeTranscriber {
        segments: segments(),
        ..Default::default()
    }
}

fn sponsor_ad() -> ClassifierReply {
    ClassifierReply::Ads(vec![AdInterval::new(10.0, 25.0, "sponsor read")])
}

#[tokio::test]
async fn test_full_run_removes_sponsor_read() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let run_id = RunId::new();

    let outcomes = fx.orchestrator.run_all(&run_id, &fx.source).await.unwrap();
    let paths = ArtifactPaths::for_source(&fx.source);

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[2].artifact(), Some(paths.no_ads.as_path()));
    assert!(paths.transcript.is_file());
    assert!(paths.analysis.is_file());
    assert!(paths.no_ads.is_file());

    let spliced = fx.codec.spliced.lock().unwrap();
    assert_eq!(
        spliced.as_slice(),
        &[vec![KeepInterval::new(0, 10_000), KeepInterval::new(25_000, 30_000)]]
    );
}

#[tokio::test]
async fn test_transcribe_is_idempotent() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let run_id = RunId::new();

    let first = fx.orchestrator.transcribe(&run_id, &fx.source).await.unwrap();
    assert!(matches!(first, StageOutcome::Completed { stage: Stage::Transcribe, .. }));

    let transcript = ArtifactPaths::for_source(&fx.source).transcript;
    let before = tokio::fs::read(&transcript).await.unwrap();
    let modified = tokio::fs::metadata(&transcript).await.unwrap().modified().unwrap();

    let second = fx.orchestrator.transcribe(&run_id, &fx.source).await.unwrap();
    assert!(matches!(second, StageOutcome::Skipped { stage: Stage::Transcribe, .. }));
    assert_eq!(fx.transcriber.calls.lock().unwrap().len(), 1);
    assert_eq!(tokio::fs::read(&transcript).await.unwrap(), before);
    assert_eq!(
        tokio::fs::metadata(&transcript).await.unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_existing_transcript_is_never_rewritten() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let transcript = ArtifactPaths::for_source(&fx.source).transcript;
    let hand_edited = r#"[{"start": 0.0, "end": 1.0, "text": "edited by hand"}]"#;
    tokio::fs::write(&transcript, hand_edited).await.unwrap();

    let outcome = fx.orchestrator.transcribe(&RunId::new(), &fx.source).await.unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Skipped {
            stage: Stage::Transcribe,
            existing: transcript.clone(),
        }
    );
    assert!(fx.transcriber.calls.lock().unwrap().is_empty());
    assert_eq!(tokio::fs::read_to_string(&transcript).await.unwrap(), hand_edited);
}

#[tokio::test]
async fn test_classify_skips_existing_analysis() {
    let fx = fixture(
        default_transcriber(),
        ClassifierReply::Malformed,
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let paths = ArtifactPaths::for_source(&fx.source);
    let existing = r#"{"ads": [{"start_time": 1.0, "end_time": 2.0, "reason": "kept"}]}"#;
    tokio::fs::write(&paths.analysis, existing).await.unwrap();

    let outcome = fx.orchestrator.classify(&RunId::new(), &fx.source).await.unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Skipped {
            stage: Stage::Classify,
            existing: paths.analysis.clone(),
        }
    );
    assert_eq!(tokio::fs::read_to_string(&paths.analysis).await.unwrap(), existing);
}

#[tokio::test]
async fn test_splice_skips_existing_output() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let paths = ArtifactPaths::for_source(&fx.source);
    let analysis = AdAnalysis::new(vec![AdInterval::new(10.0, 25.0, "sponsor read")]);
    tokio::fs::write(&paths.analysis, analysis.to_json_string().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&paths.no_ads, b"earlier cut").await.unwrap();

    let outcome = fx.orchestrator.splice(&RunId::new(), &fx.source).await.unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Skipped {
            stage: Stage::Splice,
            existing: paths.no_ads.clone(),
        }
    );
    assert!(fx.codec.spliced.lock().unwrap().is_empty());
    assert_eq!(tokio::fs::read(&paths.no_ads).await.unwrap(), b"earlier cut");
}

#[tokio::test]
async fn test_compress_skips_existing_output() {
    let settings = PipelineSettings {
        size_budget_bytes: 256.0,
        ..PipelineSettings::default()
    };
    let fx = fixture(default_transcriber(), sponsor_ad(), FakeCodec::new(30.0), settings).await;
    let compressed = ArtifactPaths::for_source(&fx.source).compressed;
    tokio::fs::write(&compressed, b"earlier encode").await.unwrap();

    let outcome = fx.orchestrator.compress(&RunId::new(), &fx.source).await.unwrap();

    assert_eq!(
        outcome,
        StageOutcome::Skipped {
            stage: Stage::Compress,
            existing: compressed.clone(),
        }
    );
    assert!(fx.codec.encoded.lock().unwrap().is_empty());
    assert_eq!(tokio::fs::read(&compressed).await.unwrap(), b"earlier encode");
}

#[tokio::test]
async fn test_empty_transcript_writes_nothing() {
    let fx = fixture(
        FakeTranscriber::default(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;

    let err = fx
        .orchestrator
        .transcribe(&RunId::new(), &fx.source)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyResult(_)));
    assert!(!ArtifactPaths::for_source(&fx.source).transcript.exists());
}

#[tokio::test]
async fn test_malformed_classifier_reply_writes_no_analysis() {
    let fx = fixture(
        default_transcriber(),
        ClassifierReply::Malformed,
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let run_id = RunId::new();

    fx.orchestrator.transcribe(&run_id, &fx.source).await.unwrap();
    let err = fx.orchestrator.classify(&run_id, &fx.source).await.unwrap_err();

    assert!(matches!(err, PipelineError::MalformedResponse(_)));
    let paths = ArtifactPaths::for_source(&fx.source);
    assert!(!paths.analysis.exists());
    assert!(!paths.transcript_analysis.exists());
}

#[tokio::test]
async fn test_classify_without_transcript_is_not_found() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;

    let err = fx
        .orchestrator
        .classify(&RunId::new(), &fx.source)
        .await
        .unwrap_err();
    let transcript = ArtifactPaths::for_source(&fx.source).transcript;
    assert!(matches!(err, PipelineError::NotFound(p) if p == transcript));
}

#[tokio::test]
async fn test_splice_with_no_ads_is_a_no_op() {
    let fx = fixture(
        default_transcriber(),
        ClassifierReply::Ads(Vec::new()),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;

    let outcomes = fx.orchestrator.run_all(&RunId::new(), &fx.source).await.unwrap();

    assert!(matches!(outcomes.last(), Some(StageOutcome::NoAds { .. })));
    assert!(!ArtifactPaths::for_source(&fx.source).no_ads.exists());
    assert!(fx.codec.spliced.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_splice_rejects_all_advertisement() {
    let fx = fixture(
        default_transcriber(),
        ClassifierReply::Ads(vec![AdInterval::new(0.0, 45.0, "wall to wall")]),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;

    let err = fx.orchestrator.run_all(&RunId::new(), &fx.source).await.unwrap_err();

    assert!(matches!(err, PipelineError::EmptyResult(_)));
    assert!(!ArtifactPaths::for_source(&fx.source).no_ads.exists());
}

#[tokio::test]
async fn test_splice_reads_analysis_stored_next_to_transcript() {
    let fx = fixture(
        default_transcriber(),
        ClassifierReply::Malformed,
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let paths = ArtifactPaths::for_source(&fx.source);
    let analysis = AdAnalysis::new(vec![AdInterval::new(10.0, 25.0, "sponsor read")]);
    tokio::fs::write(&paths.transcript_analysis, analysis.to_json_string().unwrap())
        .await
        .unwrap();

    let outcome = fx.orchestrator.splice(&RunId::new(), &fx.source).await.unwrap();
    assert_eq!(outcome.artifact(), Some(paths.no_ads.as_path()));
}

#[tokio::test]
async fn test_splice_keeps_native_bitrate() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::with_bitrate(30.0, 96_000),
        PipelineSettings::default(),
    )
    .await;

    fx.orchestrator.run_all(&RunId::new(), &fx.source).await.unwrap();

    let plans = fx.codec.splice_plans.lock().unwrap();
    assert_eq!(plans.as_slice(), &[EncodingPlan::new(96)]);
}

#[tokio::test]
async fn test_splice_falls_back_to_128k_without_probed_bitrate() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::with_bitrate(30.0, 0),
        PipelineSettings::default(),
    )
    .await;

    fx.orchestrator.run_all(&RunId::new(), &fx.source).await.unwrap();

    let plans = fx.codec.splice_plans.lock().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].target_bitrate_kbps, 128);
}

#[tokio::test]
async fn test_spliced_file_is_compressed_when_enabled() {
    let settings = PipelineSettings {
        size_budget_bytes: 8.0,
        compress_after_splice: true,
        ..PipelineSettings::default()
    };
    let fx = fixture(default_transcriber(), sponsor_ad(), FakeCodec::new(30.0), settings).await;

    let outcomes = fx.orchestrator.run_all(&RunId::new(), &fx.source).await.unwrap();

    let paths = ArtifactPaths::for_source(&fx.source);
    let compressed = ArtifactPaths::for_source(&paths.no_ads).compressed;
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[2].artifact(), Some(paths.no_ads.as_path()));
    assert_eq!(
        outcomes[3],
        StageOutcome::Completed {
            stage: Stage::Compress,
            output: compressed.clone(),
        }
    );
    assert!(compressed.is_file());
    assert!(paths.no_ads.is_file(), "spliced file is kept");
    assert!(!paths.compressed.exists(), "source itself is not compressed");

    let encoded = fx.codec.encoded.lock().unwrap();
    assert_eq!(encoded.as_slice(), &[EncodingPlan::new(32)]);
}

#[tokio::test]
async fn test_spliced_file_is_not_compressed_by_default() {
    let settings = PipelineSettings {
        size_budget_bytes: 8.0,
        ..PipelineSettings::default()
    };
    let fx = fixture(default_transcriber(), sponsor_ad(), FakeCodec::new(30.0), settings).await;

    let outcomes = fx
        .orchestrator
        .splice_and_compress(&RunId::new(), &fx.source)
        .await;

    // No analysis yet
    assert!(matches!(outcomes, Err(PipelineError::NotFound(_))));

    fx.orchestrator.analyze(&RunId::new(), &fx.source).await.unwrap();
    let outcomes = fx
        .orchestrator
        .splice_and_compress(&RunId::new(), &fx.source)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(fx.codec.encoded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_compress_within_budget_leaves_file_alone() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;

    let outcome = fx.orchestrator.compress(&RunId::new(), &fx.source).await.unwrap();

    assert_eq!(
        outcome,
        StageOutcome::WithinBudget {
            input: fx.source.clone(),
            size_bytes: 512,
        }
    );
    assert!(fx.codec.encoded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_compress_over_budget_plans_bitrate() {
    let settings = PipelineSettings {
        size_budget_bytes: 256.0,
        ..PipelineSettings::default()
    };
    let fx = fixture(default_transcriber(), sponsor_ad(), FakeCodec::new(30.0), settings).await;

    let outcome = fx.orchestrator.compress(&RunId::new(), &fx.source).await.unwrap();

    let compressed = ArtifactPaths::for_source(&fx.source).compressed;
    assert_eq!(outcome.artifact(), Some(compressed.as_path()));
    assert!(compressed.is_file());
    // 256 bytes over 30s is far below the floor
    let encoded = fx.codec.encoded.lock().unwrap();
    assert_eq!(encoded[0].target_bitrate_kbps, 32);
}

#[tokio::test]
async fn test_compress_rejects_compressed_input() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let compressed = ArtifactPaths::for_source(&fx.source).compressed;
    tokio::fs::write(&compressed, b"mp3").await.unwrap();

    let err = fx.orchestrator.compress(&RunId::new(), &compressed).await.unwrap_err();
    assert!(matches!(err, PipelineError::PreconditionViolation(_)));
}

#[tokio::test]
async fn test_oversized_source_is_compressed_before_upload() {
    let transcriber = FakeTranscriber {
        segments: segments(),
        max_upload_bytes: Some(128),
        ..Default::default()
    };
    let fx = fixture(transcriber, sponsor_ad(), FakeCodec::new(30.0), PipelineSettings::default()).await;

    let outcome = fx.orchestrator.transcribe(&RunId::new(), &fx.source).await.unwrap();

    let paths = ArtifactPaths::for_source(&fx.source);
    assert_eq!(outcome.artifact(), Some(paths.transcript.as_path()));
    assert_eq!(fx.transcriber.calls.lock().unwrap().as_slice(), &[paths.compressed.clone()]);
}

#[tokio::test]
async fn test_missing_source_is_not_found() {
    let fx = fixture(
        default_transcriber(),
        sponsor_ad(),
        FakeCodec::new(30.0),
        PipelineSettings::default(),
    )
    .await;
    let missing = fx.source.with_file_name("absent.mp3");

    let err = fx.orchestrator.transcribe(&RunId::new(), &missing).await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(p) if p == missing));
    assert!(fx.transcriber.calls.lock().unwrap().is_empty());
}

#[test]
fn test_second_lease_on_same_source_is_busy() {
    let locks = ArtifactLocks::new();
    let source = Path::new("Show/ep.mp3");

    let lease = assert_ok!(locks.try_acquire(source));
    let err = assert_err!(locks.try_acquire(source));
    assert!(matches!(err, PipelineError::Busy(_)));

    drop(lease);
    assert_ok!(locks.try_acquire(source));
}
