//! Signaling channel: wire schema and WebSocket client

pub mod client;
pub mod protocol;

pub use client::{SignalEvent, SignalingClient};
pub use protocol::SignalMessage;
