//! Session lifecycle controller
//!
//! Owns the current [`MediaSession`] behind a single guard, drives the
//! offer/answer exchange over the signaling channel, and rebuilds the
//! session when the relay or the watchdog detects a failure. The guarded
//! cell exposes exactly two operations: install (close the predecessor
//! under the lock, then store the replacement) and snapshot (clone the
//! `Arc` out). A snapshot is treated as immutable for the rest of the
//! operation that took it; staleness is an accepted, harmless race.

use crate::config::BridgeConfig;
use crate::freshness::FreshnessMarker;
use crate::session::media_session::MediaSession;
use crate::signaling::client::SignalingClient;
use crate::signaling::protocol::SignalMessage;
use crate::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Orchestrates session creation, teardown and renegotiation
pub struct SessionController {
    config: BridgeConfig,

    /// Signaling channel used for offer publication
    signaling: Arc<SignalingClient>,

    /// The current session; the only guard around it
    current: Mutex<Option<Arc<MediaSession>>>,

    /// Most recently generated, not-yet-superseded local offer
    pending_offer: parking_lot::Mutex<Option<String>>,

    /// Session-creation-in-flight flag; collapses concurrent triggers
    rebuilding: AtomicBool,

    /// Liveness marker shared with the relay and the watchdog
    freshness: Arc<FreshnessMarker>,

    /// Monotonic session id source
    next_session_id: AtomicU64,
}

/// Clears the rebuilding flag on every exit path of `create_session`
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionController {
    /// Create a controller with no session installed
    pub fn new(config: BridgeConfig, signaling: Arc<SignalingClient>) -> Arc<Self> {
        Arc::new(Self {
            config,
            signaling,
            current: Mutex::new(None),
            pending_offer: parking_lot::Mutex::new(None),
            rebuilding: AtomicBool::new(false),
            freshness: Arc::new(FreshnessMarker::new()),
            next_session_id: AtomicU64::new(0),
        })
    }

    /// The liveness marker shared with the relay and the watchdog
    pub fn freshness(&self) -> Arc<FreshnessMarker> {
        Arc::clone(&self.freshness)
    }

    /// Whether a session rebuild is currently in flight
    pub fn rebuild_in_flight(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    /// Snapshot the current session, if any
    pub async fn current_session(&self) -> Option<Arc<MediaSession>> {
        self.current.lock().await.clone()
    }

    /// The pending offer, if one has been generated and not superseded
    pub fn pending_offer(&self) -> Option<String> {
        self.pending_offer.lock().clone()
    }

    /// Drop the pending offer so it cannot be replayed
    pub fn clear_pending_offer(&self) {
        self.pending_offer.lock().take();
    }

    /// Build and install a new session, superseding any previous one
    ///
    /// Returns after negotiation has been initiated; gathering and offer
    /// publication complete asynchronously. If a rebuild is already in
    /// flight this call is a no-op. On return exactly one session is
    /// reachable by the relay and the predecessor, if any, has been closed
    /// exactly once.
    pub async fn create_session(self: &Arc<Self>) -> Result<()> {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Session rebuild already in flight, skipping");
            return Ok(());
        }
        let _guard = RebuildGuard(&self.rebuilding);

        self.clear_pending_offer();

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(MediaSession::new(id, &self.config).await?);
        let gather_complete = session.negotiate().await?;

        self.spawn_offer_publication(Arc::clone(&session), gather_complete);

        let mut current = self.current.lock().await;
        if let Some(old) = current.take() {
            if let Err(e) = old.close().await {
                debug!(session = old.id(), "Error closing superseded session: {}", e);
            }
            info!(session = old.id(), "Closed superseded session");
        }
        *current = Some(session);
        drop(current);

        info!(session = id, "Session created");
        Ok(())
    }

    /// Wait for gathering to complete, then store and publish the offer
    fn spawn_offer_publication(
        self: &Arc<Self>,
        session: Arc<MediaSession>,
        mut gather_complete: tokio::sync::mpsc::Receiver<()>,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = gather_complete.recv().await;

            let Some(sdp) = session.local_sdp().await else {
                warn!(session = session.id(), "Gathering completed without a local description");
                return;
            };

            info!(session = session.id(), "Local description ready");
            *this.pending_offer.lock() = Some(sdp.clone());
            this.send_offer_if_open(&sdp);
        });
    }

    /// Handle one inbound signaling message; never blocks the receiver
    pub async fn handle_signal(&self, msg: SignalMessage) {
        match msg {
            SignalMessage::Answer { sdp } => match self.current_session().await {
                Some(session) => match session.apply_answer(sdp).await {
                    Ok(()) => info!(session = session.id(), "Applied remote answer"),
                    // The session may have been superseded between the
                    // snapshot and the apply; a lost answer is harmless.
                    Err(e) => {
                        debug!(session = session.id(), "Ignoring inapplicable answer: {}", e)
                    }
                },
                None => debug!("Answer received before any session exists, ignoring"),
            },
            SignalMessage::Request | SignalMessage::Ready => self.resend_offer(),
            SignalMessage::Offer { .. } => debug!("Unexpected inbound offer, ignoring"),
        }
    }

    /// Replay the pending offer if one exists and the channel is open
    fn resend_offer(&self) {
        let Some(sdp) = self.pending_offer() else {
            debug!("Renegotiation requested but no offer is pending");
            return;
        };
        self.send_offer_if_open(&sdp);
    }

    fn send_offer_if_open(&self, sdp: &str) {
        if !self.signaling.is_open() {
            debug!("Signaling channel not open, holding offer");
            return;
        }
        match self.signaling.send_offer(&self.config.remote_id, sdp) {
            Ok(()) => info!("Sent offer to {}", self.config.remote_id),
            Err(e) => warn!("Failed to send offer: {}", e),
        }
    }

    /// Clear the pending offer and rebuild the session in the background
    ///
    /// Fire-and-forget relative to the caller; the relay uses this so the
    /// packet loop never blocks on session creation.
    pub fn trigger_rebuild(self: &Arc<Self>) {
        self.clear_pending_offer();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.create_session().await {
                warn!("Session rebuild failed: {}", e);
            }
        });
    }

    /// Close the current session, if any, releasing its resources
    pub async fn close_current(&self) {
        let mut current = self.current.lock().await;
        if let Some(session) = current.take() {
            if let Err(e) = session.close().await {
                debug!(session = session.id(), "Error closing session: {}", e);
            }
            info!(session = session.id(), "Session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_controller() -> Arc<SessionController> {
        // Unconnected client: channel reports closed, sends fail. The
        // default config carries no STUN servers, so sessions negotiate
        // entirely offline.
        let config = BridgeConfig::default();
        let signaling = Arc::new(SignalingClient::new(config.signaling_url()));
        SessionController::new(config, signaling)
    }

    #[tokio::test]
    async fn test_starts_with_no_session() {
        let controller = offline_controller();
        assert!(controller.current_session().await.is_none());
        assert!(controller.pending_offer().is_none());
        assert!(!controller.rebuild_in_flight());
    }

    #[tokio::test]
    async fn test_create_session_installs_one() {
        let controller = offline_controller();
        controller.create_session().await.unwrap();

        let session = controller.current_session().await.expect("session");
        assert_eq!(session.id(), 1);
        assert!(!controller.rebuild_in_flight());
    }

    #[tokio::test]
    async fn test_session_ids_are_monotonic() {
        let controller = offline_controller();
        controller.create_session().await.unwrap();
        controller.create_session().await.unwrap();

        let session = controller.current_session().await.expect("session");
        assert_eq!(session.id(), 2);
    }

    #[tokio::test]
    async fn test_answer_without_session_is_ignored() {
        let controller = offline_controller();
        controller
            .handle_signal(SignalMessage::Answer {
                sdp: "v=0".to_string(),
            })
            .await;
        assert!(controller.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_answer_leaves_session_in_place() {
        let controller = offline_controller();
        controller.create_session().await.unwrap();

        controller
            .handle_signal(SignalMessage::Answer {
                sdp: "garbage".to_string(),
            })
            .await;

        let session = controller.current_session().await.expect("session");
        assert_eq!(session.id(), 1);
    }

    #[tokio::test]
    async fn test_ready_with_closed_channel_is_quiet() {
        let controller = offline_controller();
        controller.create_session().await.unwrap();
        controller.handle_signal(SignalMessage::Ready).await;
        controller.handle_signal(SignalMessage::Request).await;
    }

    #[tokio::test]
    async fn test_close_current_empties_the_cell() {
        let controller = offline_controller();
        controller.create_session().await.unwrap();
        controller.close_current().await;
        assert!(controller.current_session().await.is_none());
    }
}
