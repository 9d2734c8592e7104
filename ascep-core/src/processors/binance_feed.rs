//! BinanceFeed processor.
//!
//! Live price producer on Binance's combined 24h ticker stream. Each
//! ticker frame becomes one price update for the configured symbol it
//! belongs to (`ETHBTC` maps back to `ETH/BTC`). The connection is
//! re-established after `reconnect_delay` whenever it drops.

use std::collections::HashMap;
use std::time::Duration;

use ascep_sdk::objects::PriceUpdate;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::handle::{EngineError, EngineHandle};

pub const BINANCE_STREAM_BASE: &str = "wss://stream.binance.com:9443";

type TickerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fields of a `24hrTicker` payload this feed reads.
#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "s")]
    symbol: String,
    /// Last price, sent as a decimal string.
    #[serde(rename = "c")]
    close: String,
    /// Base asset volume over 24h.
    #[serde(rename = "v", default)]
    volume: Option<String>,
}

/// Combined streams wrap the payload as `{"stream": ..., "data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Frame {
    Combined { data: Ticker },
    Single(Ticker),
}

/// `EUR/USD` -> `EURUSD`, the exchange's spelling.
pub fn exchange_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

/// Combined-stream URL subscribing to `<symbol>@ticker` for every symbol.
pub fn stream_url(base: &Url, symbols: &[String]) -> Result<Url, url::ParseError> {
    let streams = symbols
        .iter()
        .map(|symbol| format!("{}@ticker", exchange_symbol(symbol).to_lowercase()))
        .collect::<Vec<_>>()
        .join("/");
    let mut url = base.join("/stream")?;
    url.set_query(Some(&format!("streams={streams}")));
    Ok(url)
}

/// Decode one text frame. Frames without a usable ticker give `None`.
fn parse_ticker(text: &str, symbols: &HashMap<String, String>) -> Option<PriceUpdate> {
    let ticker = match serde_json::from_str::<Frame>(text) {
        Ok(Frame::Combined { data }) | Ok(Frame::Single(data)) => data,
        // Subscription acks and other control frames land here too.
        Err(e) => {
            debug!(error = %e, "Skipping non-ticker Binance frame");
            return None;
        }
    };
    let price = match ticker.close.parse::<f64>() {
        Ok(price) => price,
        Err(e) => {
            debug!(symbol = %ticker.symbol, error = %e, "Unreadable Binance price");
            return None;
        }
    };
    let symbol = symbols
        .get(&ticker.symbol)
        .cloned()
        .unwrap_or(ticker.symbol);

    Some(PriceUpdate {
        symbol,
        price,
        timestamp: None,
        volume: ticker.volume.and_then(|v| v.parse().ok()),
    })
}

pub struct BinanceFeed {
    handle: EngineHandle,
    url: Url,
    /// Exchange spelling to configured symbol.
    symbols: HashMap<String, String>,
    reconnect_delay: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl BinanceFeed {
    pub fn new(
        handle: EngineHandle,
        base_url: &Url,
        symbols: &[String],
        reconnect_delay: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            handle,
            url: stream_url(base_url, symbols)?,
            symbols: symbols
                .iter()
                .map(|symbol| (exchange_symbol(symbol), symbol.clone()))
                .collect(),
            reconnect_delay,
            shutdown_rx,
        })
    }

    fn stopping(&self, changed: Result<(), watch::error::RecvError>) -> bool {
        changed.is_err() || *self.shutdown_rx.borrow()
    }

    pub async fn run(mut self) {
        info!(symbols = self.symbols.len(), url = %self.url, "BinanceFeed started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if self.stopping(changed) {
                        info!("BinanceFeed received shutdown signal");
                        break;
                    }
                    continue;
                }

                connected = connect_async(self.url.as_str()) => {
                    match connected {
                        Ok((socket, _)) => {
                            info!("BinanceFeed connected");
                            if !self.pump(socket).await {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "BinanceFeed connection failed"),
                    }
                }
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if self.stopping(changed) {
                        info!("BinanceFeed received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.reconnect_delay) => {
                    debug!("BinanceFeed reconnecting");
                }
            }
        }

        info!("BinanceFeed shutdown complete");
    }

    /// Forward frames until the socket drops. Returns `false` once the
    /// feed should stop for good.
    async fn pump(&mut self, mut socket: TickerSocket) -> bool {
        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if self.stopping(changed) {
                        let _ = socket.close(None).await;
                        info!("BinanceFeed received shutdown signal");
                        return false;
                    }
                }

                frame = socket.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let Some(update) = parse_ticker(&text, &self.symbols) else {
                                continue;
                            };
                            match self.handle.ingest_price(update).await {
                                Ok(()) => {}
                                Err(EngineError::EngineStopped) => {
                                    info!("Engine stopped, BinanceFeed exiting");
                                    return false;
                                }
                                Err(e) => warn!(error = %e, "BinanceFeed price rejected"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            warn!("BinanceFeed stream closed");
                            return true;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "BinanceFeed stream error");
                            return true;
                        }
                    }
                }
            }
        }
    }
}
