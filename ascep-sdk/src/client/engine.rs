use reqwest::Client;
use url::Url;

use super::{ClientError, expect_success, parse_response};
use crate::config::Thresholds;
use crate::objects::{
    CreateRuleRequest, EventPayload, HealthResponse, IngestResponse, LatencyStatsResponse,
    ListSignalsQuery, ManualSignalRequest, PriceBatch, PriceSnapshotQuery, PriceSnapshotResponse,
    RuleListResponse, RuleObject, RuleStatsResponse, RuleTestResponse, SignalListResponse,
    SignalObject, SignalStatsResponse, ThresholdsPatch, UpdateRuleRequest,
};

/// Typed HTTP client for the engine API.
#[derive(Debug, Clone)]
pub struct EngineClient {
    pub(super) http: Client,
    pub(super) base_url: Url,
}

impl EngineClient {
    /// Create a client rooted at `base_url`, e.g. `http://localhost:8080`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /api/v1/health`
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.base_url.join("/api/v1/health")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `GET /api/v1/latency` – windowed processing latency per operation.
    pub async fn latency(&self) -> Result<LatencyStatsResponse, ClientError> {
        let url = self.base_url.join("/api/v1/latency")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `GET /api/v1/signals` – most recent signals, newest first.
    pub async fn list_signals(
        &self,
        query: &ListSignalsQuery,
    ) -> Result<SignalListResponse, ClientError> {
        let url = self.base_url.join("/api/v1/signals")?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/signals/{id}`
    pub async fn get_signal(&self, id: u64) -> Result<SignalObject, ClientError> {
        let url = self.base_url.join(&format!("/api/v1/signals/{id}"))?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `DELETE /api/v1/signals/{id}`
    pub async fn delete_signal(&self, id: u64) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("/api/v1/signals/{id}"))?;
        expect_success(self.http.delete(url).send().await?).await
    }

    /// `POST /api/v1/signals` – create a manual signal.
    pub async fn create_signal(
        &self,
        request: &ManualSignalRequest,
    ) -> Result<SignalObject, ClientError> {
        let url = self.base_url.join("/api/v1/signals")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/signals/stats`
    pub async fn signal_stats(&self) -> Result<SignalStatsResponse, ClientError> {
        let url = self.base_url.join("/api/v1/signals/stats")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `GET /api/v1/rules`
    pub async fn list_rules(&self) -> Result<RuleListResponse, ClientError> {
        let url = self.base_url.join("/api/v1/rules")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `POST /api/v1/rules`
    pub async fn create_rule(&self, request: &CreateRuleRequest) -> Result<RuleObject, ClientError> {
        let url = self.base_url.join("/api/v1/rules")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/rules/{id}`
    pub async fn get_rule(&self, id: u64) -> Result<RuleObject, ClientError> {
        let url = self.base_url.join(&format!("/api/v1/rules/{id}"))?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `PUT /api/v1/rules/{id}`
    pub async fn update_rule(
        &self,
        id: u64,
        request: &UpdateRuleRequest,
    ) -> Result<RuleObject, ClientError> {
        let url = self.base_url.join(&format!("/api/v1/rules/{id}"))?;
        let resp = self.http.put(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `DELETE /api/v1/rules/{id}`
    pub async fn delete_rule(&self, id: u64) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("/api/v1/rules/{id}"))?;
        expect_success(self.http.delete(url).send().await?).await
    }

    /// `POST /api/v1/rules/{id}/test` – dry-run a rule against a sample event.
    pub async fn test_rule(
        &self,
        id: u64,
        event: &EventPayload,
    ) -> Result<RuleTestResponse, ClientError> {
        let url = self.base_url.join(&format!("/api/v1/rules/{id}/test"))?;
        let resp = self.http.post(url).json(event).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/rules/stats`
    pub async fn rule_stats(&self) -> Result<RuleStatsResponse, ClientError> {
        let url = self.base_url.join("/api/v1/rules/stats")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `GET /api/v1/config`
    pub async fn thresholds(&self) -> Result<Thresholds, ClientError> {
        let url = self.base_url.join("/api/v1/config")?;
        parse_response(self.http.get(url).send().await?).await
    }

    /// `POST /api/v1/config` – apply a partial update and return the result.
    pub async fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
    ) -> Result<Thresholds, ClientError> {
        let url = self.base_url.join("/api/v1/config")?;
        let resp = self.http.post(url).json(patch).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/prices`
    pub async fn push_prices(&self, batch: &PriceBatch) -> Result<IngestResponse, ClientError> {
        let url = self.base_url.join("/api/v1/prices")?;
        let resp = self.http.post(url).json(batch).send().await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/prices` – fresh price snapshot.
    pub async fn prices(
        &self,
        query: &PriceSnapshotQuery,
    ) -> Result<PriceSnapshotResponse, ClientError> {
        let url = self.base_url.join("/api/v1/prices")?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/events`
    pub async fn push_event(&self, event: &EventPayload) -> Result<IngestResponse, ClientError> {
        let url = self.base_url.join("/api/v1/events")?;
        let resp = self.http.post(url).json(event).send().await?;
        parse_response(resp).await
    }
}
