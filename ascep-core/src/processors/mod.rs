//! Long-running tasks of the engine.
//!
//! - `Dispatcher`: receives `EngineEvent` and `EngineCommand`, owns all
//!   engine state, emits `OutboxMessage`
//! - `OutboxWriter`: receives `OutboxMessage`, writes the durable store and
//!   publishes to broadcast sinks
//! - `MockFeed`: produces simulated price updates on a timer
//! - `BinanceFeed`: forwards live tickers from Binance's WebSocket stream

pub mod binance_feed;
pub mod dispatcher;
pub mod mock_feed;
pub mod outbox_writer;

pub use binance_feed::{BINANCE_STREAM_BASE, BinanceFeed};
pub use dispatcher::{Dispatcher, EngineOptions, EventOutcome};
pub use mock_feed::MockFeed;
pub use outbox_writer::{DEFAULT_SIGNAL_TTL, OutboxWriter, WriterOptions, load_rules};
