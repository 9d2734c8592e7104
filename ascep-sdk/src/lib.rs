//! Shared types for the ASCEP arbitrage signal and complex event processing engine.
//!
//! - [`objects`]: request/response and stream payloads exchanged with the server.
//! - [`config`]: detection thresholds shared by the engine and its config surface.
//! - `client`: typed HTTP/WebSocket client, behind the `client` feature.

pub mod config;
pub mod objects;

#[cfg(feature = "client")]
pub mod client;
