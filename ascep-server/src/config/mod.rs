//! Configuration module for ascep-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use ascep_sdk::config::ThresholdsError;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdsError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Read the TOML file, apply CLI overrides and validate.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.parse(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<FileConfig, ConfigError> {
        self.load()
    }

    fn parse(&self, content: &str) -> Result<FileConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    config.thresholds.validate()?;

    let engine = &config.engine;
    if engine.queue_capacity == 0 || engine.outbox_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "engine queue and outbox capacities must be at least 1".into(),
        ));
    }
    if engine.sink_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "engine.sink_timeout_ms must be positive".into(),
        ));
    }
    if config.server.stream_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "server.stream_buffer must be at least 1".into(),
        ));
    }

    let feed = &config.mock_feed;
    if feed.enabled && (feed.interval_ms == 0 || feed.symbols.is_empty()) {
        return Err(ConfigError::ValidationError(
            "mock_feed needs a positive interval_ms and at least one symbol".into(),
        ));
    }

    let binance = &config.binance_feed;
    if binance.enabled && binance.symbols.is_empty() {
        return Err(ConfigError::ValidationError(
            "binance_feed needs at least one symbol".into(),
        ));
    }
    if let Some(url) = binance.url.as_ref().filter(|u| !matches!(u.scheme(), "ws" | "wss")) {
        return Err(ConfigError::ValidationError(format!(
            "binance_feed.url must be a ws:// or wss:// URL, got {url}"
        )));
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_override() {
        let listen: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let loader = ConfigLoader::new("unused.toml", Some(listen));
        let config = loader.parse("[server]\nlisten = \"0.0.0.0:1\"\n").unwrap();
        assert_eq!(config.server.listen, listen);
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let loader = ConfigLoader::new("unused.toml", None);
        let err = loader
            .parse("[thresholds.severity_thresholds]\nhigh = 0.1\nmedium = 0.2\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Thresholds(_)));

        let err = loader
            .parse("[engine]\nqueue_capacity = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_enabled_feed_needs_symbols() {
        let loader = ConfigLoader::new("unused.toml", None);
        assert!(loader.parse("[mock_feed]\nenabled = true\nsymbols = []\n").is_err());
        assert!(loader.parse("[mock_feed]\nenabled = true\n").is_ok());
    }

    #[test]
    fn test_binance_feed_validation() {
        let loader = ConfigLoader::new("unused.toml", None);
        assert!(loader.parse("[binance_feed]\nenabled = true\n").is_ok());
        assert!(loader.parse("[binance_feed]\nenabled = true\nsymbols = []\n").is_err());
        assert!(
            loader
                .parse("[binance_feed]\nurl = \"https://api.binance.com\"\n")
                .is_err()
        );
    }

    #[test]
    fn test_missing_file() {
        let loader = ConfigLoader::new("/nonexistent/ascep-config.toml", None);
        assert!(matches!(loader.load(), Err(ConfigError::IoError(_))));
    }
}
