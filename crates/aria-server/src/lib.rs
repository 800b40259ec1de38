//! # aria-server
//!
//! JSON-over-HTTP front end for the orchestrator, for UIs that cannot speak
//! to the CLI. Routes:
//!
//! - `GET /health` liveness and version
//! - `GET /status` model, tools, sessions and recent tool usage
//! - `POST /chat` one user message in, the agent's reply out, keyed by session
//! - `DELETE /sessions/{id}` forget a conversation

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use aria_config::ApiConfig;
use aria_core::{AriaError, Result};
use aria_runtime::Orchestrator;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handler state.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    started: Instant,
    requests_served: AtomicU64,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started: Instant::now(),
            requests_served: AtomicU64::new(0),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Omitted: a fresh session is started and its id returned.
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: String,
    is_error: bool,
    hit_iteration_cap: bool,
    model_calls: u32,
    tool_calls: u32,
    tokens_used: u32,
    duration_ms: u64,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Build the router over an existing orchestrator.
pub fn build_router(orchestrator: Arc<Orchestrator>, config: &ApiConfig) -> Router {
    let state = Arc::new(AppState::new(orchestrator));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions/{id}", delete(delete_session_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let orchestrator = &state.orchestrator;
    let tools: Vec<String> = orchestrator
        .registry()
        .schemas()
        .into_iter()
        .map(|d| d.name)
        .collect();

    Json(json!({
        "status": "running",
        "model": orchestrator.settings().model,
        "active_tools": tools,
        "tool_calls_last_minute": orchestrator.registry().call_stats(),
        "tool_rate_limit_per_minute": orchestrator.registry().rate_limit(),
        "sessions": orchestrator.sessions().len().await,
        "uptime_secs": state.started.elapsed().as_secs(),
        "requests_served": state.requests_served.load(Ordering::Relaxed),
    }))
}

async fn chat_handler(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "message is empty");
    }
    let session_id = match req.session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    state.requests_served.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    let reply = state.orchestrator.run(&session_id, message).await;

    // The model was unreachable; the text says why.
    let status = if reply.is_error {
        warn!(session = %session_id, error = %reply.text, "chat request failed");
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };

    let body = ChatResponse {
        tokens_used: reply.usage.total_tokens(),
        response: reply.text,
        session_id,
        is_error: reply.is_error,
        hit_iteration_cap: reply.hit_iteration_cap,
        model_calls: reply.model_calls,
        tool_calls: reply.tool_calls,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    (status, Json(body)).into_response()
}

async fn delete_session_handler(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if state.orchestrator.sessions().remove(&id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_body(StatusCode::NOT_FOUND, format!("no session: {id}"))
    }
}

/// A bound HTTP API listener.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    pub async fn bind(config: &ApiConfig, orchestrator: Arc<Orchestrator>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen).await.map_err(|e| {
            AriaError::Transport(format!("failed to bind HTTP API on {}: {e}", config.listen))
        })?;
        Ok(Self {
            listener,
            router: build_router(orchestrator, config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `cancel` fires, then let in-flight requests finish.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "HTTP API listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| AriaError::Transport(format!("HTTP API error: {e}")))?;

        info!(%addr, "HTTP API stopped");
        Ok(())
    }
}
