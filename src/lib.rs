//! media-bridge - Session lifecycle controller for UDP-to-WebRTC relay
//!
//! Bridges a local RTP-over-UDP stream into a WebRTC peer connection that is
//! negotiated over an out-of-band WebSocket signaling channel. The crate owns
//! the full session lifecycle: building peer connections, publishing offers,
//! applying remote answers, forwarding packets, and tearing sessions down and
//! renegotiating when the remote side restarts or the stream goes quiet.
//!
//! ```text
//! UDP :6000 --> PacketRelay --> MediaSession (webrtc) --> remote peer
//!                    |                ^
//!                    v                |
//!             FreshnessMarker   SessionController <--> SignalingClient (ws)
//!                    ^                ^
//!                    |                |
//!                    +-- IdleWatchdog +
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod freshness;
pub mod relay;
pub mod session;
pub mod signaling;
pub mod watchdog;

mod error;
pub use error::{Error, Result};

pub use config::BridgeConfig;
pub use freshness::FreshnessMarker;
pub use relay::PacketRelay;
pub use session::{MediaSession, SessionController};
pub use signaling::{SignalEvent, SignalMessage, SignalingClient};
pub use watchdog::{IdleWatchdog, WatchdogHandle};

/// Initialize logging for the bridge
///
/// Call once at startup. Respects `RUST_LOG`, defaulting to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Crate version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
