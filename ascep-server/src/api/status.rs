use ascep_sdk::objects::{HealthResponse, LatencyStatsResponse};
use axum::{Json, extract::State};

use crate::state::AppState;

/// `GET /health`: returns OK while the server is running.
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        signals: state.engine.signal_count(),
        rules: state.engine.rule_count(),
    })
}

pub(super) async fn latency(State(state): State<AppState>) -> Json<LatencyStatsResponse> {
    Json(state.engine.latency())
}
