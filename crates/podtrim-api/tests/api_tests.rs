//! HTTP surface tests driven through the router with in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use podtrim_api::{create_router, ApiConfig, AppState};
use podtrim_media::{AudioCodec, AudioInfo, MediaResult};
use podtrim_models::{AdAnalysis, EncodingPlan, KeepInterval, Transcript};
use podtrim_worker::classifier::ClassificationResult;
use podtrim_worker::transcription::TranscriptionResult;
use podtrim_worker::{
    AdClassifier, Catalog, FeedConfig, FeedDownloader, Orchestrator, PipelineRunner,
    PipelineSettings, Transcriber,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_test::assert_ok;
use tower::ServiceExt;

struct SilentTranscriber;

#[async_trait]
impl Transcriber for SilentTranscriber {
    async fn transcribe(&self, _audio: &Path) -> TranscriptionResult<Transcript> {
        Ok(Transcript::default())
    }

    fn name(&self) -> &str {
        "silent"
    }
}

struct NoAdsClassifier;

#[async_trait]
impl AdClassifier for NoAdsClassifier {
    async fn classify(&self, _transcript: &Transcript) -> ClassificationResult<AdAnalysis> {
        Ok(AdAnalysis::default())
    }

    fn name(&self) -> &str {
        "no-ads"
    }
}

struct NullCodec;

#[async_trait]
impl AudioCodec for NullCodec {
    async fn probe(&self, _path: &Path) -> MediaResult<AudioInfo> {
        Ok(AudioInfo {
            duration: 30.0,
            size: 0,
            bitrate: 0,
            codec: "mp3".to_string(),
            sample_rate: 44_100,
            channels: 2,
        })
    }

    async fn splice(
        &self,
        _source: &Path,
        _keep: &[KeepInterval],
        _plan: &EncodingPlan,
        _output: &Path,
    ) -> MediaResult<()> {
        Ok(())
    }

    async fn encode(&self, _source: &Path, _plan: &EncodingPlan, _output: &Path) -> MediaResult<()> {
        Ok(())
    }
}

struct TestApp {
    dir: TempDir,
    state: AppState,
    router: Router,
}

impl TestApp {
    fn root(&self) -> &Path {
        self.dir.path()
    }

    async fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root().join(name);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        Arc::new(SilentTranscriber),
        Arc::new(NoAdsClassifier),
        Arc::new(NullCodec),
        PipelineSettings::default(),
    );
    let feed = FeedDownloader::new(dir.path(), FeedConfig::default()).unwrap();
    let runner = PipelineRunner::new(Arc::new(orchestrator), Arc::new(feed), 2);
    let state = AppState::new(ApiConfig::default(), Catalog::new(dir.path()), runner);
    let router = create_router(state.clone(), None);
    TestApp { dir, state, router }
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["runs_in_flight"], 0);
}

#[tokio::test]
async fn test_list_podcasts_sorted_and_filtered() {
    let app = test_app();
    app.write("Show/b.mp3", "audio").await;
    app.write("Show/a.mp3", "audio").await;
    app.write("Show/a.mp3.json", "[]").await;
    app.write("Show/notes.txt", "ignored").await;

    let (status, body) = app.get("/podcasts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["Show/a.mp3", "Show/a.mp3.json", "Show/b.mp3"]));
}

#[tokio::test]
async fn test_list_podcasts_on_empty_library() {
    let app = test_app();
    let (status, body) = app.get("/podcasts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_status_reports_existing_artifacts() {
    let app = test_app();
    app.write("Show/a.mp3", "audio").await;
    app.write("Show/a.mp3.json", "[]").await;

    let (status, body) = app.get("/podcasts/status?filename=Show/a.mp3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "Show/a.mp3");
    assert_eq!(body["source_exists"], true);
    assert_eq!(body["transcript"], true);
    assert_eq!(body["analysis"], false);
    assert_eq!(body["in_flight"], false);
    assert_eq!(body["next_stage"], "classify");
}

#[tokio::test]
async fn test_analyze_missing_source_is_404() {
    let app = test_app();
    let (status, body) = app.post("/analyze", json!({"filename": "Show/missing.mp3"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("missing.mp3"));
}

#[tokio::test]
async fn test_traversal_is_rejected() {
    let app = test_app();
    for name in ["../outside.mp3", "/etc/passwd.mp3", "Show/../../x.mp3"] {
        let (status, _) = app.post("/analyze", json!({ "filename": name })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
    }
}

#[tokio::test]
async fn test_analyze_is_accepted() {
    let app = test_app();
    app.write("Show/a.mp3", "audio").await;

    let (status, body) = app.post("/analyze", json!({"filename": "Show/a.mp3"})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["output_filename"], "Show/a.mp3.analysis.json");
}

#[tokio::test]
async fn test_second_trigger_while_in_flight_is_409() {
    let app = test_app();
    let source = app.write("Show/a.mp3", "audio").await;
    let _lease = assert_ok!(app.state.runner.locks().try_acquire(&source));

    let (status, body) = app.post("/analyze", json!({"filename": "Show/a.mp3"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().is_some());

    let (_, status_body) = app.get("/podcasts/status?filename=Show/a.mp3").await;
    assert_eq!(status_body["in_flight"], true);
}

#[tokio::test]
async fn test_splice_requires_analysis() {
    let app = test_app();
    app.write("Show/a.mp3", "audio").await;

    let (status, body) = app.post("/splice", json!({"filename": "Show/a.mp3"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("analysis"));
}

#[tokio::test]
async fn test_splice_returns_output_filename() {
    let app = test_app();
    app.write("Show/a.mp3", "audio").await;
    app.write("Show/a.mp3.analysis.json", r#"{"ads": []}"#).await;

    let (status, body) = app.post("/splice", json!({"filename": "Show/a.mp3"})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["output_filename"], "Show/a_no_ads.mp3");
}

#[tokio::test]
async fn test_compress_validates_audio_artifact() {
    let app = test_app();
    app.write("Show/a.mp3.json", "[]").await;

    let (status, _) = app.post("/compress", json!({"filename": "Show/a.mp3"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.post("/compress", json!({"filename": "Show/a.mp3.json"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compress_no_ads_output_name() {
    let app = test_app();
    app.write("Show/a.mp3", "audio").await;
    app.write("Show/a_no_ads.mp3", "audio").await;

    let (status, body) = app.post("/compress", json!({"filename": "Show/a_no_ads.mp3"})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["output_filename"], "Show/a_no_ads.compressed.mp3");
}

#[tokio::test]
async fn test_download_validates_request() {
    let app = test_app();

    let (status, _) = app
        .post("/download", json!({"rss_url": "http://169.254.169.254/latest"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/download", json!({"rss_url": "ftp://example.com/feed.xml"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/download",
            json!({"rss_url": "https://example.com/feed.xml", "num_episodes": 0}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app();
    let (status, _) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = test_app();
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["X-Request-ID"], "abc-123");
}
