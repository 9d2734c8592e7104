//! TOML file configuration structures.
//!
//! These structs directly map to the `ascep-config.toml` file format.
//! Every section is optional; an empty file runs the engine with
//! in-memory storage and default thresholds.

use ascep_sdk::config::Thresholds;
use ascep_sdk::objects::Topic;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
    #[serde(default)]
    pub mock_feed: MockFeedConfig,
    #[serde(default)]
    pub binance_feed: BinanceFeedConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Per-subscriber buffer of the WebSocket stream.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_stream_buffer() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// Engine sizing and outbound behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queue_capacity: usize,
    pub outbox_capacity: usize,
    pub sink_timeout_ms: u64,
    pub feed_signals_to_rules: bool,
    pub signal_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            outbox_capacity: 1024,
            sink_timeout_ms: 250,
            feed_signals_to_rules: true,
            signal_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    /// Reads `DATABASE_URL`.
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            max_connections: 10,
        }
    }
}

/// An HTTP broadcast target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: url::Url,
    /// Topics delivered to this URL. Empty means all.
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Simulated price producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockFeedConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub symbols: Vec<String>,
}

impl Default for MockFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 100,
            symbols: ["EUR/USD", "USD/EUR", "GBP/USD"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Live tickers from Binance's combined stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceFeedConfig {
    pub enabled: bool,
    /// Stream endpoint. Defaults to Binance's public one.
    pub url: Option<url::Url>,
    pub symbols: Vec<String>,
    pub reconnect_delay_ms: u64,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            symbols: ["BTC/USDT", "ETH/USDT", "ETH/BTC"]
                .map(String::from)
                .to_vec(),
            reconnect_delay_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[engine]
queue_capacity = 64
feed_signals_to_rules = false

[thresholds]
cross_currency_threshold = 0.05
max_signals_per_cycle = 3

[thresholds.severity_thresholds]
high = 1.0
medium = 0.4

[store]
backend = "postgres"

[[webhooks]]
url = "https://hooks.example.com/ascep"
topics = ["alerts", "cep_signals"]

[mock_feed]
enabled = true
interval_ms = 250

[binance_feed]
enabled = true
symbols = ["BTC/USDT", "ETH/BTC"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.stream_buffer, 256);
        assert_eq!(config.engine.queue_capacity, 64);
        assert_eq!(config.engine.outbox_capacity, 1024);
        assert!(!config.engine.feed_signals_to_rules);
        assert_eq!(config.thresholds.cross_currency_threshold, 0.05);
        assert_eq!(config.thresholds.triangular_threshold, 0.2);
        assert_eq!(config.thresholds.max_signals_per_cycle, 3);
        assert_eq!(config.thresholds.severity_thresholds.high, 1.0);
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.webhooks[0].topics, vec![Topic::Alerts, Topic::CepSignals]);
        assert!(config.mock_feed.enabled);
        assert_eq!(config.mock_feed.symbols.len(), 3);
        assert!(config.binance_feed.enabled);
        assert_eq!(config.binance_feed.symbols, vec!["BTC/USDT", "ETH/BTC"]);
        assert_eq!(config.binance_feed.url, None);
        assert_eq!(config.binance_feed.reconnect_delay_ms, 5_000);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn test_unknown_topic_is_rejected() {
        let toml_str = r#"
[[webhooks]]
url = "https://hooks.example.com/ascep"
topics = ["everything"]
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
