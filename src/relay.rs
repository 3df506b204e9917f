//! Packet relay: local RTP ingest and identity rewrite
//!
//! Receives raw RTP datagrams from the fixed local endpoint and forwards
//! them through the current session's track. Per-packet failures (no
//! session yet, transport not up, undersized datagram) are silent: the
//! producer may legitimately be running before any session exists or
//! during a renegotiation window, and per-packet logging would flood.

use crate::config::BridgeConfig;
use crate::session::controller::SessionController;
use crate::{Error, Result};
use socket2::SockRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Minimum RTP header length; anything shorter cannot be a valid packet
pub const RTP_HEADER_LEN: usize = 12;

/// Byte offset of the SSRC field within the RTP header
const SSRC_OFFSET: usize = 8;

const BUFFER_SIZE: usize = 2048;
const RECV_BACKOFF: Duration = Duration::from_millis(200);

/// Local inbound datagram listener feeding the current session
pub struct PacketRelay {
    socket: UdpSocket,
    ssrc: u32,
}

impl PacketRelay {
    /// Bind the fixed local endpoint; failure here is fatal at startup
    pub async fn bind(config: &BridgeConfig) -> Result<Self> {
        let socket = UdpSocket::bind(&config.listen_addr).await.map_err(|e| {
            Error::PacketSourceError(format!(
                "failed to bind UDP socket on {}: {}",
                config.listen_addr, e
            ))
        })?;

        if let Err(e) = SockRef::from(&socket).set_recv_buffer_size(config.recv_buffer_size) {
            debug!("Failed to set receive buffer size: {}", e);
        }

        info!("RTP stream expected on {}", config.listen_addr);
        Ok(Self {
            socket,
            ssrc: config.ssrc,
        })
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive and forward packets until the shutdown signal fires
    ///
    /// Keeps running through recv errors (the producer may stop and
    /// restart at any time) and never blocks on session creation: a failed
    /// send triggers a background rebuild and the loop continues.
    pub async fn run(
        &self,
        controller: Arc<SessionController>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut buf = [0u8; BUFFER_SIZE];
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Packet relay stopping");
                    break;
                }
                result = self.socket.recv(&mut buf) => match result {
                    Ok(len) => self.forward(&controller, &mut buf[..len]).await,
                    Err(e) => {
                        error!("recv failed: {}", e);
                        tokio::time::sleep(RECV_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Forward one datagram through the current session
    async fn forward(&self, controller: &Arc<SessionController>, packet: &mut [u8]) {
        if packet.len() < RTP_HEADER_LEN {
            return;
        }

        let Some(session) = controller.current_session().await else {
            return;
        };
        if !session.is_open() {
            return;
        }

        // Arrival, not successful delivery, is the upstream liveness
        // signal, so stamp before attempting the send.
        controller.freshness().touch();

        rewrite_ssrc(packet, self.ssrc);

        if let Err(e) = session.write_rtp(packet).await {
            info!(session = session.id(), "Track send failed, rebuilding session: {}", e);
            controller.trigger_rebuild();
        }
    }
}

/// Overwrite the packet's SSRC field in place
///
/// Bytes outside the 4-byte SSRC field are left untouched, so the remote
/// peer sees a stable source identity across renegotiations while payload
/// and the rest of the header pass through byte-identical.
pub fn rewrite_ssrc(packet: &mut [u8], ssrc: u32) {
    debug_assert!(packet.len() >= RTP_HEADER_LEN);
    packet[SSRC_OFFSET..SSRC_OFFSET + 4].copy_from_slice(&ssrc.to_be_bytes());
}
