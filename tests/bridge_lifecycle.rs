//! End-to-end lifecycle tests running without any network peers
//!
//! The default config carries no STUN servers, so ICE gathering finishes
//! with host candidates only and sessions negotiate fully offline. The
//! signaling client is left unconnected, which models a closed channel.

use media_bridge::{BridgeConfig, SessionController, SignalMessage, SignalingClient};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

fn offline_controller() -> Arc<SessionController> {
    let config = BridgeConfig::default();
    let signaling = Arc::new(SignalingClient::new(config.signaling_url()));
    SessionController::new(config, signaling)
}

/// Poll until the predicate holds or the deadline passes
async fn wait_for<F: Fn() -> bool>(predicate: F, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate()
}

#[tokio::test]
async fn test_repeated_rebuilds_supersede_cleanly() {
    let controller = offline_controller();

    assert_ok!(controller.create_session().await);
    let first = controller.current_session().await.unwrap();
    assert_eq!(first.id(), 1);

    assert_ok!(controller.create_session().await);
    let second = controller.current_session().await.unwrap();
    assert_eq!(second.id(), 2);

    // The predecessor must have been closed when its replacement landed.
    let closed = wait_for(
        || first.connection_state() == RTCPeerConnectionState::Closed,
        Duration::from_secs(5),
    )
    .await;
    assert!(closed, "superseded session was not closed");

    assert_ok!(controller.create_session().await);
    let third = controller.current_session().await.unwrap();
    assert_eq!(third.id(), 3);
}

#[tokio::test]
async fn test_answer_for_superseded_session_is_tolerated() {
    let controller = offline_controller();
    controller.create_session().await.unwrap();

    // Garbage SDP must be swallowed, not propagate or poison the session.
    controller
        .handle_signal(SignalMessage::Answer {
            sdp: "not a session description".to_string(),
        })
        .await;

    assert!(controller.current_session().await.is_some());

    // Rebuild, then deliver an answer that targeted the old session. The
    // controller applies it against whatever is current and moves on.
    controller.create_session().await.unwrap();
    controller
        .handle_signal(SignalMessage::Answer {
            sdp: "v=0\r\nstale".to_string(),
        })
        .await;

    let current = controller.current_session().await.unwrap();
    assert_eq!(current.id(), 2);
    assert_ne!(current.connection_state(), RTCPeerConnectionState::Closed);
}

#[tokio::test]
async fn test_answer_before_any_session_is_ignored() {
    let controller = offline_controller();
    controller
        .handle_signal(SignalMessage::Answer {
            sdp: "v=0\r\n".to_string(),
        })
        .await;
    assert!(controller.current_session().await.is_none());
}

#[tokio::test]
async fn test_pending_offer_cleared_on_rebuild() {
    let controller = offline_controller();
    controller.create_session().await.unwrap();

    // Offline gathering completes quickly, at which point the offer is
    // stored for replay.
    let stored = {
        let controller = Arc::clone(&controller);
        wait_for(move || controller.pending_offer().is_some(), Duration::from_secs(5)).await
    };
    assert!(stored, "offer was never generated");

    let first_offer = controller.pending_offer().unwrap();
    assert!(first_offer.contains("m=video"));

    // A rebuild drops the stale offer immediately.
    controller.create_session().await.unwrap();
    let replaced = {
        let controller = Arc::clone(&controller);
        let stale = first_offer.clone();
        wait_for(
            move || controller.pending_offer().is_some_and(|o| o != stale),
            Duration::from_secs(5),
        )
        .await
    };
    assert!(replaced, "stale offer survived the rebuild");
}

#[tokio::test]
async fn test_replay_requests_without_offer_are_quiet() {
    let controller = offline_controller();

    // No session, no pending offer, channel closed. Both replay triggers
    // must be no-ops.
    controller.handle_signal(SignalMessage::Request).await;
    controller.handle_signal(SignalMessage::Ready).await;
    assert!(controller.pending_offer().is_none());
}

#[tokio::test]
async fn test_inbound_offer_is_ignored() {
    let controller = offline_controller();
    controller.create_session().await.unwrap();

    controller
        .handle_signal(SignalMessage::Offer {
            id: "someone".to_string(),
            sdp: "v=0\r\n".to_string(),
        })
        .await;

    let current = controller.current_session().await.unwrap();
    assert_eq!(current.id(), 1);
}

#[tokio::test]
async fn test_close_current_is_idempotent() {
    let controller = offline_controller();
    controller.create_session().await.unwrap();
    let session = controller.current_session().await.unwrap();

    controller.close_current().await;
    assert!(controller.current_session().await.is_none());

    let closed = wait_for(
        || session.connection_state() == RTCPeerConnectionState::Closed,
        Duration::from_secs(5),
    )
    .await;
    assert!(closed);

    // Closing with nothing installed is fine.
    controller.close_current().await;
}
