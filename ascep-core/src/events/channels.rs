//! Channel factories for the dispatcher's inputs and its outbox.

use super::types::{EngineCommand, EngineEvent, OutboxMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default buffer size for the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default buffer size for the outbox.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;
/// Commands are rare and always awaited by their caller.
pub const COMMAND_CHANNEL_BUFFER: usize = 64;

pub type EventSender = mpsc::Sender<EngineEvent>;
pub type EventReceiver = mpsc::Receiver<EngineEvent>;

pub type CommandSender = mpsc::Sender<EngineCommand>;
pub type CommandReceiver = mpsc::Receiver<EngineCommand>;

pub type OutboxSender = mpsc::Sender<OutboxMessage>;
pub type OutboxReceiver = mpsc::Receiver<OutboxMessage>;

/// Bounded event queue. Producers wait when it is full.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::channel(COMMAND_CHANNEL_BUFFER)
}

/// Bounded outbox. The dispatcher never waits on it; overflow is dropped.
pub fn outbox_channel(capacity: usize) -> (OutboxSender, OutboxReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Non-blocking handle onto the outbox.
///
/// Posting never waits: a full outbox drops the message with a warning,
/// which keeps a slow sink from stalling the dispatcher.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: OutboxSender,
}

impl Outbox {
    pub fn new(tx: OutboxSender) -> Self {
        Self { tx }
    }

    pub fn post(&self, message: OutboxMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(message = message.label(), "Outbox full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(message = message.label(), "Outbox closed, dropping message");
            }
        }
    }
}
