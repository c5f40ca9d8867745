#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use attest_scan::client::ServiceResponse;
use attest_scan::{ScanBackend, ScanError, ScanRequest, ScanResult};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use tokio::sync::Semaphore;

pub fn result(detected: &[&str], violations: &[&str]) -> ScanResult {
    ScanResult::new(
        detected.iter().map(|s| s.to_string()).collect(),
        violations.iter().map(|s| s.to_string()).collect(),
    )
}

pub fn request(name: &str) -> ScanRequest {
    ScanRequest {
        file_name: name.to_string(),
        file_content: "requests==2.31\n".to_string(),
    }
}

/// In-memory backend replaying one outcome. With `gated`, every call waits for `release()`.
pub struct FakeBackend {
    calls: AtomicUsize,
    gate: Option<Semaphore>,
    outcome: Mutex<Result<ScanResult, String>>,
}

impl FakeBackend {
    pub fn ok(result: ScanResult) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            outcome: Mutex::new(Ok(result)),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            outcome: Mutex::new(Err(reason.to_string())),
        })
    }

    pub fn gated(result: ScanResult) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Some(Semaphore::new(0)),
            outcome: Mutex::new(Ok(result)),
        })
    }

    pub fn set_outcome(&self, outcome: Result<ScanResult, String>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` submissions have reached the backend.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ScanBackend for FakeBackend {
    async fn submit(&self, _request: ScanRequest) -> attest_scan::error::Result<ServiceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate open")
                .forget();
        }
        let outcome = self.outcome.lock().unwrap().clone();
        outcome
            .map(ServiceResponse::from)
            .map_err(ScanError::NetworkFailure)
    }
}

/// What the stub scan service received.
#[derive(Debug, Clone)]
pub struct Captured {
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<Captured>>>,
}

/// A local `POST /scan` endpoint answering with a canned status and body.
pub struct StubService {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Captured>>>,
}

impl StubService {
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO).await
    }

    pub async fn start_with_delay(status: StatusCode, body: &'static str, delay: Duration) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status,
            body,
            delay,
            seen: seen.clone(),
        };
        let app = Router::new()
            .route("/scan", post(stub_scan))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.seen.lock().unwrap().clone()
    }
}

async fn stub_scan(
    State(stub): State<StubState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.seen.lock().unwrap().push(Captured {
        content_type,
        body: body.to_vec(),
    });
    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    (
        stub.status,
        [(header::CONTENT_TYPE, "application/json")],
        stub.body,
    )
}
