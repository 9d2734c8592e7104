use ascep_core::entities::RuleId;
use ascep_sdk::objects::{
    CreateRuleRequest, EventPayload, RuleListResponse, RuleObject, RuleStatsResponse,
    RuleTestResponse, UpdateRuleRequest,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::ApiError;
use crate::state::AppState;

pub(super) async fn list_rules(State(state): State<AppState>) -> Json<RuleListResponse> {
    let rules: Vec<RuleObject> = state
        .engine
        .list_rules()
        .iter()
        .map(RuleObject::from)
        .collect();
    let total = rules.len();
    Json(RuleListResponse { rules, total })
}

/// `POST /rules`: register a rule. Unknown patterns and actions are
/// rejected by deserialization.
pub(super) async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.engine.register_rule(request).await?;
    Ok((StatusCode::CREATED, Json(RuleObject::from(&rule))))
}

pub(super) async fn rule_stats(State(state): State<AppState>) -> Json<RuleStatsResponse> {
    Json(state.engine.rule_stats())
}

pub(super) async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
) -> Result<Json<RuleObject>, ApiError> {
    let rule = state.engine.get_rule(id)?;
    Ok(Json(RuleObject::from(&rule)))
}

pub(super) async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<RuleObject>, ApiError> {
    let rule = state.engine.update_rule(id, request).await?;
    Ok(Json(RuleObject::from(&rule)))
}

pub(super) async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rules/{id}/test`: evaluate without touching trigger counts or
/// running the action.
pub(super) async fn test_rule(
    State(state): State<AppState>,
    Path(id): Path<RuleId>,
    Json(event): Json<EventPayload>,
) -> Result<Json<RuleTestResponse>, ApiError> {
    let matched = state.engine.test_rule(id, event).await?;
    Ok(Json(RuleTestResponse {
        rule_id: id,
        matched,
    }))
}
