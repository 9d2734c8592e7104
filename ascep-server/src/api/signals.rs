use ascep_core::entities::SignalId;
use ascep_sdk::objects::{
    ListSignalsQuery, ManualSignalRequest, SignalListResponse, SignalObject, SignalStatsResponse,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::ApiError;
use crate::state::AppState;

/// `GET /signals`: the most recent signals, newest first.
pub(super) async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<ListSignalsQuery>,
) -> Json<SignalListResponse> {
    let signals: Vec<SignalObject> = state
        .engine
        .recent_signals(query.clamped())
        .iter()
        .map(SignalObject::from)
        .collect();
    Json(SignalListResponse {
        signals,
        total: state.engine.signal_count(),
    })
}

/// `POST /signals`: create a manual signal.
pub(super) async fn create_signal(
    State(state): State<AppState>,
    Json(request): Json<ManualSignalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let signal = state.engine.create_manual_signal(request).await?;
    Ok((StatusCode::CREATED, Json(SignalObject::from(&signal))))
}

pub(super) async fn signal_stats(State(state): State<AppState>) -> Json<SignalStatsResponse> {
    Json(state.engine.signal_stats())
}

pub(super) async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<SignalId>,
) -> Result<Json<SignalObject>, ApiError> {
    let signal = state.engine.get_signal(id)?;
    Ok(Json(SignalObject::from(&signal)))
}

/// `DELETE /signals/{id}`: remove from history; the durable record
/// is deleted asynchronously.
pub(super) async fn delete_signal(
    State(state): State<AppState>,
    Path(id): Path<SignalId>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_signal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
