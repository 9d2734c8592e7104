use ascep_sdk::objects::{
    EventPayload, IngestResponse, PriceBatch, PriceEntryObject, PriceSnapshotQuery,
    PriceSnapshotResponse,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use super::ApiError;
use crate::state::AppState;

/// `POST /prices`: queue one update or a batch. Waits while the engine
/// queue is full.
pub(super) async fn ingest_prices(
    State(state): State<AppState>,
    Json(batch): Json<PriceBatch>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let accepted = state.engine.ingest_prices(batch.into_vec()).await?;
    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted })))
}

pub(super) async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<EventPayload>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    state.engine.ingest_event(event).await?;
    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted: 1 })))
}

/// `GET /prices?max_age_ms=`: cached prices no older than `max_age_ms`,
/// defaulting to the freshness window.
pub(super) async fn price_snapshot(
    State(state): State<AppState>,
    Query(query): Query<PriceSnapshotQuery>,
) -> Result<Json<PriceSnapshotResponse>, ApiError> {
    let max_age_ms = match query.max_age_ms {
        Some(ms) => ms,
        None => state.engine.thresholds().await.freshness_window_ms,
    };
    let max_age = time::Duration::milliseconds(i64::try_from(max_age_ms).unwrap_or(i64::MAX));
    let prices = state
        .engine
        .price_snapshot(Some(max_age))
        .await?
        .iter()
        .map(PriceEntryObject::from)
        .collect();
    Ok(Json(PriceSnapshotResponse { max_age_ms, prices }))
}
