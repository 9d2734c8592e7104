//! MockFeed processor.
//!
//! Random-walk price producer for demos and local testing. Every tick
//! moves each symbol by up to ±0.001, keeps the well-known FX pairs inside
//! plausible bands, and ingests the batch through the engine handle.

use std::time::Duration;

use ascep_sdk::objects::PriceUpdate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::entities::Symbol;
use crate::handle::{EngineError, EngineHandle};

const MAX_STEP: f64 = 0.001;
/// Floor for symbols without a band so the walk never leaves positive prices.
const MIN_PRICE: f64 = 0.0001;

fn initial_price(symbol: &str) -> f64 {
    match symbol {
        "EUR/USD" => 1.0850,
        "USD/EUR" => 0.9217,
        "GBP/USD" => 1.2650,
        _ => 1.0,
    }
}

fn band(symbol: &str) -> Option<(f64, f64)> {
    match symbol {
        "EUR/USD" => Some((1.05, 1.12)),
        "USD/EUR" => Some((0.89, 0.95)),
        "GBP/USD" => Some((1.20, 1.33)),
        _ => None,
    }
}

pub struct MockFeed {
    handle: EngineHandle,
    prices: Vec<(Symbol, f64)>,
    interval: Duration,
    rng: StdRng,
    shutdown_rx: watch::Receiver<bool>,
}

impl MockFeed {
    pub fn new(
        handle: EngineHandle,
        symbols: &[String],
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self::with_rng(handle, symbols, interval, shutdown_rx, StdRng::from_os_rng())
    }

    pub fn with_rng(
        handle: EngineHandle,
        symbols: &[String],
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
        rng: StdRng,
    ) -> Self {
        let prices = symbols
            .iter()
            .map(|symbol| (Symbol::from(symbol.as_str()), initial_price(symbol)))
            .collect();
        Self {
            handle,
            prices,
            interval,
            rng,
            shutdown_rx,
        }
    }

    /// Advance every symbol by one step.
    pub fn step(&mut self) -> Vec<PriceUpdate> {
        let now = OffsetDateTime::now_utc();
        self.prices
            .iter_mut()
            .map(|(symbol, price)| {
                let next = *price + self.rng.random_range(-MAX_STEP..=MAX_STEP);
                *price = match band(symbol) {
                    Some((low, high)) => next.clamp(low, high),
                    None => next.max(MIN_PRICE),
                };
                PriceUpdate {
                    symbol: symbol.to_string(),
                    price: *price,
                    timestamp: Some(now),
                    volume: None,
                }
            })
            .collect()
    }

    pub async fn run(mut self) {
        info!(
            symbols = self.prices.len(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "MockFeed started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("MockFeed received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let batch = self.step();
                    match self.handle.ingest_prices(batch).await {
                        Ok(count) => debug!(count, "MockFeed tick ingested"),
                        Err(EngineError::EngineStopped) => {
                            info!("Engine stopped, MockFeed exiting");
                            break;
                        }
                        Err(e) => warn!(error = %e, "MockFeed tick rejected"),
                    }
                }
            }
        }

        info!("MockFeed shutdown complete");
    }
}
