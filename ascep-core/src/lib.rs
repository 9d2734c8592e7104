#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cache;
pub mod config;
pub mod detection;
pub mod entities;
pub mod events;
pub mod framework;
pub mod handle;
pub mod latency;
pub mod processors;
pub mod rules;
pub mod signals;
pub mod sinks;

pub use handle::{EngineError, EngineHandle};
