//! Error types for the media bridge

/// Result type alias using the bridge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bridging media
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling channel error (message could not be sent)
    #[error("Signaling error: {0}")]
    SignalingError(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Session lifecycle error
    #[error("Session error: {0}")]
    SessionError(String),

    /// SDP negotiation error
    #[error("SDP negotiation error: {0}")]
    SdpError(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// Local packet source error (bind failure, socket teardown)
    #[error("Packet source error: {0}")]
    PacketSourceError(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error aborts startup (no session-level recovery applies)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_) | Error::PacketSourceError(_) | Error::WebSocketError(_)
        )
    }

    /// Check if this error is recovered by rebuilding the session
    pub fn is_session_recoverable(&self) -> bool {
        matches!(self, Error::MediaTrackError(_) | Error::SessionError(_))
    }
}
