//! WebSocket signaling client
//!
//! Thin duplex channel to the rendezvous service. Outbound messages go
//! through an unbounded queue drained by a sender task; inbound text frames
//! are decoded and surfaced on an event channel so the consumer never runs
//! on the socket's read loop.

use crate::signaling::protocol::SignalMessage;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Events surfaced to the signaling consumer
#[derive(Debug)]
pub enum SignalEvent {
    /// A decoded inbound message
    Message(SignalMessage),
    /// The channel closed or failed; no further messages will arrive
    Closed,
}

/// WebSocket signaling client
pub struct SignalingClient {
    /// Rendezvous URL (`ws://<host>:<port>/<local id>`)
    url: String,

    /// Outgoing frame queue
    tx: mpsc::UnboundedSender<Message>,

    /// Whether the channel is currently open
    open: Arc<AtomicBool>,
}

impl SignalingClient {
    /// Create an unconnected client
    ///
    /// Until [`connect`](Self::connect) succeeds, `is_open()` is false and
    /// sends fail.
    pub fn new(url: impl Into<String>) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();

        Self {
            url: url.into(),
            tx,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The rendezvous URL this client targets
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the channel is confirmed open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Connect to the signaling server
    ///
    /// Returns the inbound event stream. A handshake failure here is fatal
    /// at startup: the channel closed before the first connection.
    pub async fn connect(&mut self) -> Result<mpsc::UnboundedReceiver<SignalEvent>> {
        info!("Connecting to signaling server: {}", self.url);

        let (ws_stream, _) = connect_async(&self.url).await.map_err(|e| {
            Error::WebSocketError(format!("failed to connect to {}: {}", self.url, e))
        })?;

        info!("Signaling channel open");
        self.open.store(true, Ordering::Relaxed);

        let (write, read) = ws_stream.split();

        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = tx;

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, Arc::clone(&self.open), event_tx));

        Ok(event_rx)
    }

    /// Sender task: drains the outgoing queue into the WebSocket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("Failed to send signaling message: {}", e);
                break;
            }
        }

        debug!("Signaling sender task terminated");
    }

    /// Receiver task: decodes inbound frames and forwards them as events
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        open: Arc<AtomicBool>,
        events: mpsc::UnboundedSender<SignalEvent>,
    ) {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match SignalMessage::from_json(&text) {
                    Ok(msg) => {
                        if events.send(SignalEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    // The channel may carry unrelated traffic; drop quietly.
                    Err(e) => debug!("Dropping unrecognized signaling message: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("Signaling channel closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Signaling channel error: {}", e);
                    break;
                }
            }
        }

        open.store(false, Ordering::Relaxed);
        let _ = events.send(SignalEvent::Closed);
        debug!("Signaling receiver task terminated");
    }

    /// Send an offer message addressed to `remote_id`
    pub fn send_offer(&self, remote_id: &str, sdp: &str) -> Result<()> {
        let msg = SignalMessage::Offer {
            id: remote_id.to_string(),
            sdp: sdp.to_string(),
        };
        let json = msg
            .to_json()
            .map_err(|e| Error::SignalingError(format!("failed to encode offer: {}", e)))?;

        self.tx
            .send(Message::Text(json))
            .map_err(|_| Error::SignalingError("signaling channel is not connected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_client_is_closed() {
        let client = SignalingClient::new("ws://localhost:8000/sender");
        assert_eq!(client.url(), "ws://localhost:8000/sender");
        assert!(!client.is_open());
    }

    #[test]
    fn test_unconnected_send_fails() {
        let client = SignalingClient::new("ws://localhost:8000/sender");
        assert!(client.send_offer("browser", "v=0").is_err());
    }
}
