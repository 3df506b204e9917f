//! Configuration for the media bridge

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the bridge
///
/// Defaults mirror the reference deployment: a local H264 RTP producer on
/// `127.0.0.1:6000`, a signaling server on `127.0.0.1:8000`, and peer ids
/// `sender`/`browser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Signaling server host
    pub signaling_host: String,

    /// Signaling server port
    pub signaling_port: u16,

    /// Local peer id (the rendezvous path this process registers under)
    pub local_id: String,

    /// Remote peer id (the `id` field stamped on outbound offers)
    pub remote_id: String,

    /// Local UDP endpoint the RTP producer sends to
    pub listen_addr: String,

    /// Receive buffer size requested on the UDP socket, in bytes
    pub recv_buffer_size: usize,

    /// Fixed forwarding SSRC stamped onto every outbound packet
    pub ssrc: u32,

    /// RTP payload type of the upstream H264 stream
    pub payload_type: u8,

    /// STUN server URLs (empty means host candidates only)
    pub stun_servers: Vec<String>,

    /// How long the upstream may stay silent before the session is rebuilt,
    /// in milliseconds
    pub idle_threshold_ms: u64,

    /// Watchdog tick interval in milliseconds
    pub watchdog_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            signaling_host: "127.0.0.1".to_string(),
            signaling_port: 8000,
            local_id: "sender".to_string(),
            remote_id: "browser".to_string(),
            listen_addr: "127.0.0.1:6000".to_string(),
            recv_buffer_size: 212_992,
            ssrc: 42,
            payload_type: 96,
            stun_servers: Vec::new(),
            idle_threshold_ms: 2000,
            watchdog_interval_ms: 200,
        }
    }
}

impl BridgeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.signaling_host.is_empty() {
            return Err(Error::InvalidConfig(
                "signaling_host cannot be empty".to_string(),
            ));
        }
        if self.signaling_port == 0 {
            return Err(Error::InvalidConfig(
                "signaling_port cannot be 0".to_string(),
            ));
        }
        if self.local_id.is_empty() || self.remote_id.is_empty() {
            return Err(Error::InvalidConfig(
                "local_id and remote_id cannot be empty".to_string(),
            ));
        }
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(Error::InvalidConfig(format!(
                "listen_addr '{}' is not a valid socket address",
                self.listen_addr
            )));
        }
        if self.idle_threshold_ms == 0 {
            return Err(Error::InvalidConfig(
                "idle_threshold_ms cannot be 0".to_string(),
            ));
        }
        if self.watchdog_interval_ms == 0 || self.watchdog_interval_ms > self.idle_threshold_ms {
            return Err(Error::InvalidConfig(format!(
                "watchdog_interval_ms must be between 1 and idle_threshold_ms ({})",
                self.idle_threshold_ms
            )));
        }
        for url in &self.stun_servers {
            if !url.starts_with("stun:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN server URL must start with 'stun:': {}",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Rendezvous URL of the signaling channel: `ws://<host>:<port>/<local id>`
    pub fn signaling_url(&self) -> String {
        format!(
            "ws://{}:{}/{}",
            self.signaling_host, self.signaling_port, self.local_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ssrc, 42);
        assert_eq!(config.payload_type, 96);
        assert_eq!(config.idle_threshold_ms, 2000);
    }

    #[test]
    fn test_signaling_url() {
        let config = BridgeConfig::default();
        assert_eq!(config.signaling_url(), "ws://127.0.0.1:8000/sender");
    }

    #[test]
    fn test_empty_ids_rejected() {
        let config = BridgeConfig {
            local_id: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let config = BridgeConfig {
            listen_addr: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_must_not_exceed_threshold() {
        let config = BridgeConfig {
            idle_threshold_ms: 100,
            watchdog_interval_ms: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stun_url_scheme_checked() {
        let config = BridgeConfig {
            stun_servers: vec!["turn:example.org:3478".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
