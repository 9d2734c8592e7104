//! Event system for the dispatcher pipeline.
//!
//! # Flow
//!
//! 1. Producers (HTTP ingestion, mock feed) push `EngineEvent` -> `Dispatcher`
//! 2. The API layer sends `EngineCommand` -> `Dispatcher` and awaits the reply
//! 3. `Dispatcher` emits `OutboxMessage` -> `OutboxWriter`
//! 4. `OutboxWriter` writes to the durable store and publishes to broadcast sinks
//!
//! The dispatcher is the only owner of engine state, so events and
//! commands are applied strictly one at a time.

pub mod channels;
pub mod types;

pub use channels::{
    COMMAND_CHANNEL_BUFFER, CommandReceiver, CommandSender, DEFAULT_OUTBOX_CAPACITY,
    DEFAULT_QUEUE_CAPACITY, EventReceiver, EventSender, Outbox, OutboxReceiver, OutboxSender,
    command_channel, event_channel, outbox_channel,
};

pub use types::{
    ARBITRAGE_SIGNAL_EVENT, EngineCommand, EngineEvent, OutboxMessage, PRICE_UPDATE_EVENT,
    PriceTick, Reply,
};
