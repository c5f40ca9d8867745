use std::path::PathBuf;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    client::ScanBackend,
    session::ScanSession,
    source,
    types::SessionState,
};

/// Session shared with the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    session: ScanSession<dyn ScanBackend>,
}

impl AppState {
    pub fn new(session: ScanSession<dyn ScanBackend>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanFileRequest {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Accepted {
    file_name: String,
    state: &'static str,
}

/// JSON API over the scan session, for a dashboard to poll.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/results", get(get_results))
        .route("/history", get(get_history))
        .route("/scan", post(post_scan))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState) -> Result<()> {
    let app = router(state);
    info!(%bind, "serving scan API");
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.session.snapshot().await))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    match app.session.state().await {
        SessionState::Displaying { report } => (StatusCode::OK, Json(report)).into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn get_history(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.session.history().await))
}

async fn post_scan(
    State(app): State<AppState>,
    Json(req): Json<ScanFileRequest>,
) -> impl IntoResponse {
    let request = match source::read_request(req.path.as_deref()).await {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    // Claim the session before answering so a second POST sees `Scanning`.
    let Some(ticket) = app.session.begin(&request.file_name).await else {
        return (StatusCode::CONFLICT, "a scan is already in progress".to_string())
            .into_response();
    };
    let file_name = ticket.file_name().to_string();

    let session = app.session.clone();
    tokio::spawn(async move {
        let outcome = session.backend().submit(request).await;
        if session.complete(ticket, outcome).await.is_none() {
            warn!("scan response arrived after the session moved on");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(Accepted {
            file_name,
            state: "scanning",
        }),
    )
        .into_response()
}
