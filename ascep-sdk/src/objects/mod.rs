//! Wire types exchanged between the engine server and its clients.

pub mod events;
pub mod prices;
pub mod rules;
pub mod signals;
pub mod status;
pub mod thresholds;
pub mod ws;

pub use events::EventPayload;
pub use prices::{
    IngestResponse, PriceBatch, PriceEntryObject, PriceSnapshotQuery, PriceSnapshotResponse,
    PriceUpdate,
};
pub use rules::{
    CreateRuleRequest, PatternKind, RuleAction, RuleListResponse, RuleObject, RuleStatsResponse,
    RuleTestResponse, UpdateRuleRequest,
};
pub use signals::{
    ListSignalsQuery, ManualSignalRequest, Severity, SignalKind, SignalListResponse, SignalObject,
    SignalStatsResponse,
};
pub use status::{HealthResponse, LatencyStatsResponse, LatencySummaryObject};
pub use thresholds::{SeverityThresholdsPatch, ThresholdsPatch};
pub use ws::{RuleNotice, StreamMessage, Topic, UnknownTopic};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
