//! One transport session: a peer connection with a single send-only RTP track

use crate::config::BridgeConfig;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;

/// One handshake attempt / lifetime of the transport
///
/// Owns the peer connection and the outbound video track. The session id is
/// monotonic per process and appears in every lifecycle log line, which
/// makes a late answer for a superseded session visible to operators.
pub struct MediaSession {
    id: u64,
    peer_connection: Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticRTP>,
}

impl MediaSession {
    /// Build a session against the WebRTC engine
    ///
    /// Registers the state-change handlers before any negotiation is
    /// triggered, attaches a single send-only video media line, and starts
    /// the RTCP drain task the interceptors need.
    pub async fn new(id: u64, config: &BridgeConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: codec_capability(),
                    payload_type: config.payload_type,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .map_err(|e| Error::WebRtcError(format!("failed to register codec: {}", e)))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| Error::WebRtcError(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let peer_connection = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::WebRtcError(format!("failed to create peer connection: {}", e)))?,
        );

        // Observability only; no state transition hangs off these.
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                info!(session = id, "Connection state: {}", state);
                Box::pin(async {})
            },
        ));
        peer_connection.on_ice_gathering_state_change(Box::new(
            move |state: RTCIceGathererState| {
                debug!(session = id, "Gathering state: {}", state);
                Box::pin(async {})
            },
        ));

        let track = Arc::new(TrackLocalStaticRTP::new(
            codec_capability(),
            "video".to_string(),
            "media-bridge".to_string(),
        ));

        let transceiver = peer_connection
            .add_transceiver_from_track(
                Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| Error::MediaTrackError(format!("failed to add video track: {}", e)))?;

        // Drain RTCP from the sender so the interceptors keep running.
        let rtp_sender = transceiver.sender().await;
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
            debug!(session = id, "RTCP drain task stopped");
        });

        Ok(Self {
            id,
            peer_connection,
            track,
        })
    }

    /// Monotonic session number
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start local negotiation
    ///
    /// Creates the offer, sets it as the local description and returns the
    /// engine's gathering-complete promise. Gathering finishes
    /// asynchronously; await the receiver, then read [`local_sdp`].
    ///
    /// [`local_sdp`]: Self::local_sdp
    pub async fn negotiate(&self) -> Result<mpsc::Receiver<()>> {
        let gather_complete = self.peer_connection.gathering_complete_promise().await;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::SdpError(format!("failed to create offer: {}", e)))?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("failed to set local description: {}", e)))?;

        Ok(gather_complete)
    }

    /// The finalized local description, once gathering has completed
    pub async fn local_sdp(&self) -> Option<String> {
        self.peer_connection
            .local_description()
            .await
            .map(|desc| desc.sdp)
    }

    /// Apply the remote answer, completing the handshake for this session
    pub async fn apply_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::SdpError(format!("failed to parse answer: {}", e)))?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("failed to set remote description: {}", e)))
    }

    /// Whether the transport is up and the track can carry media
    pub fn is_open(&self) -> bool {
        self.peer_connection.connection_state() == RTCPeerConnectionState::Connected
    }

    /// Current connection state
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection.connection_state()
    }

    /// Forward one RTP packet through the track
    pub async fn write_rtp(&self, packet: &[u8]) -> Result<()> {
        self.track
            .write(packet)
            .await
            .map(|_| ())
            .map_err(|e| Error::MediaTrackError(format!("track send failed: {}", e)))
    }

    /// Close the session; it accepts no further media afterwards
    pub async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::SessionError(format!("failed to close peer connection: {}", e)))
    }
}

fn codec_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_H264.to_string(),
        clock_rate: 90000,
        channels: 0,
        sdp_fmtp_line: String::new(),
        rtcp_feedback: vec![],
    }
}
