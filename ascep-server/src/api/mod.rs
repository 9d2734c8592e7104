//! HTTP API handlers, mounted under `/api/v1`.
//!
//! # Endpoints
//!
//! - `GET    /health`              – liveness, version, signal and rule counts
//! - `GET    /latency`             – windowed processing latency
//! - `GET    /signals`             – recent signals, newest first
//! - `POST   /signals`             – create a manual signal
//! - `GET    /signals/stats`       – signal statistics
//! - `GET    /signals/{id}`        – one signal
//! - `DELETE /signals/{id}`        – drop a signal from history and the store
//! - `GET    /rules`               – registered rules
//! - `POST   /rules`               – register a rule
//! - `GET    /rules/stats`         – rule statistics
//! - `GET    /rules/{id}`          – one rule
//! - `PUT    /rules/{id}`          – update a rule
//! - `DELETE /rules/{id}`          – delete a rule
//! - `POST   /rules/{id}/test`     – dry-run a rule against a sample event
//! - `GET    /config`              – current thresholds
//! - `POST   /config`              – patch thresholds
//! - `GET    /prices`              – fresh price snapshot
//! - `POST   /prices`              – ingest one or many price updates
//! - `POST   /events`              – ingest a generic event
//! - `GET    /ws`                  – live stream of published messages

use ascep_core::EngineError;
use ascep_sdk::objects::ErrorResponse;
use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::state::AppState;

mod config;
mod ingest;
mod rules;
mod signals;
mod status;
mod ws;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(status::health))
        .route("/latency", get(status::latency))
        .route(
            "/signals",
            get(signals::list_signals).post(signals::create_signal),
        )
        .route("/signals/stats", get(signals::signal_stats))
        .route(
            "/signals/{id}",
            get(signals::get_signal).delete(signals::delete_signal),
        )
        .route("/rules", get(rules::list_rules).post(rules::create_rule))
        .route("/rules/stats", get(rules::rule_stats))
        .route(
            "/rules/{id}",
            get(rules::get_rule)
                .put(rules::update_rule)
                .delete(rules::delete_rule),
        )
        .route("/rules/{id}/test", post(rules::test_rule))
        .route(
            "/config",
            get(config::get_thresholds).post(config::update_thresholds),
        )
        .route(
            "/prices",
            get(ingest::price_snapshot).post(ingest::ingest_prices),
        )
        .route("/events", post(ingest::ingest_event))
        .route("/ws", get(ws::stream_ws))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// A request parameter the extractors could not reject on their own.
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(EngineError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Engine(EngineError::RuleNotFound(_) | EngineError::SignalNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Engine(EngineError::Evaluation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Engine(EngineError::EngineStopped) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error = match self {
            ApiError::Engine(EngineError::EngineStopped) => {
                tracing::warn!("API request while the engine is stopped");
                EngineError::EngineStopped.to_string()
            }
            ApiError::Engine(e) => {
                tracing::debug!(error = %e, status = status.as_u16(), "API request rejected");
                e.to_string()
            }
            ApiError::BadRequest(message) => message,
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascep_core::entities::ValidationError;
    use ascep_core::rules::EvaluationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(EngineError::Validation(ValidationError::EmptySymbol)),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::from(EngineError::RuleNotFound(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(EngineError::SignalNotFound(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(EngineError::Evaluation(EvaluationError::NonNumericField {
                    field: "volume",
                })),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(EngineError::EngineStopped),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status);
            assert_eq!(error.into_response().status(), status);
        }
    }
}
