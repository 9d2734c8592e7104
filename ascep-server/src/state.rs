//! Application state shared across all request handlers.

use ascep_core::EngineHandle;
use ascep_core::sinks::ChannelBroadcaster;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Front door to the running engine.
    pub engine: EngineHandle,
    /// In-process broadcast that WebSocket connections subscribe to.
    pub stream: ChannelBroadcaster,
}

impl AppState {
    pub fn new(engine: EngineHandle, stream: ChannelBroadcaster) -> Self {
        Self { engine, stream }
    }
}
