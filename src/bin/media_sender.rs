//! media-sender binary entry point
//!
//! Relays a local RTP-over-UDP stream to a WebRTC peer negotiated over a
//! WebSocket signaling server.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: signaling ws://127.0.0.1:8000/sender, RTP on 127.0.0.1:6000
//! cargo run --bin media-sender
//!
//! # Point at a remote signaling server and peer
//! cargo run --bin media-sender -- \
//!   --signaling-host signal.example.com \
//!   --signaling-port 8000 \
//!   --remote-id browser
//!
//! # Add a STUN server for NAT traversal
//! cargo run --bin media-sender -- \
//!   --stun-servers stun:stun.l.google.com:19302
//! ```

use clap::Parser;
use media_bridge::{
    BridgeConfig, IdleWatchdog, PacketRelay, SessionController, SignalEvent, SignalingClient,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// UDP-to-WebRTC media bridge
///
/// Listens for RTP packets on a local UDP socket and forwards them over a
/// WebRTC video track. Session negotiation runs over an out-of-band
/// WebSocket signaling channel; sessions are rebuilt automatically when the
/// remote peer restarts or the stream goes idle.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Signaling server hostname
    #[arg(long, default_value = "127.0.0.1", env = "BRIDGE_SIGNALING_HOST")]
    signaling_host: String,

    /// Signaling server port
    #[arg(long, default_value_t = 8000, env = "BRIDGE_SIGNALING_PORT")]
    signaling_port: u16,

    /// Identity announced to the signaling server
    #[arg(long, default_value = "sender", env = "BRIDGE_LOCAL_ID")]
    local_id: String,

    /// Peer identity offers are addressed to
    #[arg(long, default_value = "browser", env = "BRIDGE_REMOTE_ID")]
    remote_id: String,

    /// Local UDP address to receive RTP on
    #[arg(long, default_value = "127.0.0.1:6000", env = "BRIDGE_LISTEN")]
    listen: String,

    /// SSRC stamped onto outgoing RTP packets
    #[arg(long, default_value_t = 42, env = "BRIDGE_SSRC")]
    ssrc: u32,

    /// RTP payload type negotiated for the video track
    #[arg(long, default_value_t = 96, env = "BRIDGE_PAYLOAD_TYPE")]
    payload_type: u8,

    /// STUN servers (comma-separated), empty for host-only candidates
    #[arg(long, value_delimiter = ',', env = "BRIDGE_STUN_SERVERS")]
    stun_servers: Vec<String>,

    /// Silence duration before the stream is declared idle
    #[arg(long, default_value_t = 2000, env = "BRIDGE_IDLE_THRESHOLD_MS")]
    idle_threshold_ms: u64,
}

impl Args {
    fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            signaling_host: self.signaling_host,
            signaling_port: self.signaling_port,
            local_id: self.local_id,
            remote_id: self.remote_id,
            listen_addr: self.listen,
            ssrc: self.ssrc,
            payload_type: self.payload_type,
            stun_servers: self.stun_servers,
            idle_threshold_ms: self.idle_threshold_ms,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    media_bridge::init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        signaling = %args.signaling_host,
        listen = %args.listen,
        "media-sender starting"
    );

    let config = args.into_config();
    config.validate()?;

    let relay = PacketRelay::bind(&config).await?;

    let mut signaling = SignalingClient::new(config.signaling_url());
    let mut events = signaling.connect().await?;
    info!("Connected to signaling server at {}", signaling.url());

    let signaling = Arc::new(signaling);
    let controller = SessionController::new(config.clone(), Arc::clone(&signaling));

    controller.create_session().await?;

    // Inbound signaling dispatch
    let dispatch_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SignalEvent::Message(msg) => dispatch_controller.handle_signal(msg).await,
                SignalEvent::Closed => {
                    warn!("Signaling channel closed");
                    break;
                }
            }
        }
    });

    let watchdog = IdleWatchdog::spawn(Arc::clone(&controller), Arc::clone(&signaling), &config);

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

    tokio::select! {
        _ = relay.run(Arc::clone(&controller), shutdown_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    watchdog.shutdown().await;
    controller.close_current().await;

    info!("media-sender stopped");
    Ok(())
}
