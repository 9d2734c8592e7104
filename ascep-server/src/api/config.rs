use ascep_sdk::config::Thresholds;
use ascep_sdk::objects::ThresholdsPatch;
use axum::{Json, extract::State};

use super::ApiError;
use crate::state::AppState;

pub(super) async fn get_thresholds(State(state): State<AppState>) -> Json<Thresholds> {
    Json(state.engine.thresholds().await)
}

/// `POST /config`: apply the fields present in the body. Unknown fields
/// are ignored; an invalid result is rejected as a whole.
pub(super) async fn update_thresholds(
    State(state): State<AppState>,
    Json(patch): Json<ThresholdsPatch>,
) -> Result<Json<Thresholds>, ApiError> {
    let thresholds = state.engine.update_thresholds(&patch).await?;
    tracing::info!(?patch, "Thresholds updated via API");
    Ok(Json(thresholds))
}
