//! Drives the real HTTP transport against a local canned-response queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::routing::{get, post};
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use heartmula_jobs::materialize::decode_and_save;
use heartmula_jobs::{
    ClientConfig, ErrorCode, GenerationRequest, JobRunner, PollOptions, RunpodTransport,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// A request as seen by the fake queue.
#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

type Responder = dyn Fn(&Seen, usize) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct QueueState {
    seen: Arc<Mutex<Vec<Seen>>>,
    respond: Arc<Responder>,
}

/// Serverless queue API on a local port, answering from a closure.
struct FakeQueue {
    base: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl FakeQueue {
    /// `respond` receives the request and the number of requests before it.
    async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Seen, usize) -> (u16, String) + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = QueueState {
            seen: seen.clone(),
            respond: Arc::new(respond),
        };

        let app = Router::new()
            .route("/v2/{endpoint}/run", post(record))
            .route("/v2/{endpoint}/runsync", post(record))
            .route("/v2/{endpoint}/status/{id}", get(record))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v2", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, seen }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::resolve_with(Some("test-key".into()), Some("ep".into()), |_| None)
            .unwrap()
            .with_api_base(self.base.clone())
            .with_poll_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_secs(10))
    }

    fn runner(&self) -> JobRunner<RunpodTransport> {
        let config = self.config();
        JobRunner::new(
            RunpodTransport::new(&config).unwrap(),
            PollOptions::from(&config),
        )
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn record(
    State(state): State<QueueState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let seen = Seen {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };
    let index = {
        let mut log = state.seen.lock().unwrap();
        log.push(seen.clone());
        log.len() - 1
    };

    let (status, payload) = (state.respond)(&seen, index);
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
}

fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

fn completed_body(audio: &[u8]) -> String {
    json!({
        "id": "abc123",
        "status": "COMPLETED",
        "output": {
            "audio_base64": BASE64.encode(audio),
            "duration_ms": 60000,
            "sample_rate": 48000,
            "format": "mp3",
            "size_bytes": audio.len()
        }
    })
    .to_string()
}

fn request() -> GenerationRequest {
    GenerationRequest::new("[verse]\nHello world").with_tags(["pop", "upbeat"])
}

#[tokio::test]
async fn submit_poll_and_save() {
    let audio = pattern(1024);
    let body = completed_body(&audio);
    let queue = FakeQueue::start(move |seen, index| match (seen.method.as_str(), index) {
        ("POST", _) => (200, json!({"id": "abc123", "status": "IN_QUEUE"}).to_string()),
        ("GET", 1) => (200, json!({"id": "abc123", "status": "IN_QUEUE"}).to_string()),
        ("GET", _) => (200, body.clone()),
        _ => (405, "{}".to_string()),
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("output.mp3");

    let done = queue
        .runner()
        .run(&request(), &CancellationToken::new())
        .await
        .unwrap();
    let saved = decode_and_save(&done.output, &dest).unwrap();

    assert_eq!(done.job_id, "abc123");
    assert_eq!(saved.size_bytes, 1024);
    assert_eq!(saved.sample_rate, Some(48000));
    assert_eq!(std::fs::read(&dest).unwrap(), audio);

    let seen = queue.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/v2/ep/run");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer test-key"));
    let submitted: Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(submitted["input"]["lyrics"], "[verse]\nHello world");
    assert_eq!(submitted["input"]["tags"], "pop,upbeat");
    assert_eq!(seen[1].path, "/v2/ep/status/abc123");
    assert_eq!(seen[2].path, "/v2/ep/status/abc123");
}

#[tokio::test]
async fn synchronous_run_uses_runsync() {
    let audio = pattern(64);
    let body = completed_body(&audio);
    let queue = FakeQueue::start(move |_, _| (200, body.clone())).await;

    let done = queue
        .runner()
        .run_sync(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(done.output.size_bytes, Some(64));
    let seen = queue.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/v2/ep/runsync");
}

#[tokio::test]
async fn http_error_is_transport_error_with_body() {
    let queue = FakeQueue::start(|_, _| (401, r#"{"error":"invalid api key"}"#.to_string())).await;

    let err = queue
        .runner()
        .run(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Transport);
    assert!(err.message.contains("401"));
    assert!(err.message.contains("invalid api key"));
}

#[tokio::test]
async fn submit_without_id_is_protocol_error() {
    let queue = FakeQueue::start(|_, _| (200, json!({"status": "IN_QUEUE"}).to_string())).await;

    let err = queue
        .runner()
        .run(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Protocol);
    assert_eq!(queue.seen().len(), 1);
}

#[tokio::test]
async fn malformed_json_is_transport_error() {
    let queue = FakeQueue::start(|_, _| (200, "<html>gateway</html>".to_string())).await;

    let err = queue
        .runner()
        .run(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Transport);
}

#[tokio::test]
async fn worker_error_surfaces_as_domain_error() {
    let queue = FakeQueue::start(|seen, _| match seen.method.as_str() {
        "POST" => (200, json!({"id": "abc123"}).to_string()),
        _ => (
            200,
            json!({
                "id": "abc123",
                "status": "COMPLETED",
                "output": {"error": "CUDA out of memory", "kind": "GENERATION_FAILED"}
            })
            .to_string(),
        ),
    })
    .await;

    let err = queue
        .runner()
        .run(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Domain);
    assert!(err.message.contains("CUDA out of memory"));
}

#[tokio::test]
async fn invalid_request_sends_nothing() {
    let queue = FakeQueue::start(|_, _| (200, "{}".to_string())).await;

    let err = queue
        .runner()
        .run(
            &request().with_max_audio_length_ms(300_000),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Validation);
    assert!(queue.seen().is_empty());
}
