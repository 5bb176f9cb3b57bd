// =============================================================================
// REST API Endpoints — Axum 0.8
// =============================================================================
//
// All endpoints live under `/api/v1/`. Read endpoints are public; the only
// mutating endpoint (timeframe switch) requires a valid Bearer token checked
// via the `AuthBearer` extractor.
//
// CORS is configured permissively so a dashboard served from another origin
// can read the feed.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::types::Timeframe;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/symbols/{symbol}", get(symbol))
        .route("/api/v1/timeframes", get(timeframes))
        .route("/api/v1/config", get(config))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/config/timeframe", post(set_timeframe))
        // ── WebSocket (handled in the ws module but mounted here) ───
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    ws_clients: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        ws_clients: state.ws_clients.load(std::sync::atomic::Ordering::Relaxed),
    })
}

// =============================================================================
// Dashboard data
// =============================================================================

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_dashboard())
}

async fn symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    state
        .symbol_view(&symbol)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("symbol '{symbol}' is not tracked")))
}

async fn timeframes() -> impl IntoResponse {
    let all: Vec<&'static str> = Timeframe::ALL.iter().map(Timeframe::as_str).collect();
    Json(all)
}

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    Json(config)
}

// =============================================================================
// Timeframe switch (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct TimeframeRequest {
    timeframe: String,
}

#[derive(Serialize)]
struct TimeframeResponse {
    timeframe: Timeframe,
    previous: Timeframe,
}

async fn set_timeframe(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<TimeframeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let timeframe: Timeframe = req
        .timeframe
        .parse()
        .map_err(|e: anyhow::Error| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    // Clone config and drop write lock before saving.
    let (previous, config_clone) = {
        let mut config = state.runtime_config.write();
        let previous = config.timeframe;
        config.timeframe = timeframe;
        (previous, config.clone())
    };

    if previous != timeframe {
        info!(from = %previous, to = %timeframe, "Timeframe switched via API");

        // Save to disk (best-effort).
        if let Err(e) = config_clone.save(&state.config_path) {
            warn!(error = %e, "Failed to save timeframe to disk");
        }

        state.refresh.notify_one();
        state.increment_version();
    }

    Ok(Json(TimeframeResponse { timeframe, previous }))
}
