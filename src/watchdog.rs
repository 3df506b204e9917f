//! Idle watchdog
//!
//! The only time-driven component. UDP gives no disconnect event when the
//! upstream producer dies or restarts, so prolonged silence is the sole
//! failure signal: once the stream has been quiet past the threshold, the
//! watchdog tears the session down and renegotiates from scratch.

use crate::config::BridgeConfig;
use crate::session::controller::SessionController;
use crate::signaling::client::SignalingClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Periodic idle check over the controller's freshness marker
pub struct IdleWatchdog;

impl IdleWatchdog {
    /// Spawn the watchdog loop; it runs until the handle shuts it down
    pub fn spawn(
        controller: Arc<SessionController>,
        signaling: Arc<SignalingClient>,
        config: &BridgeConfig,
    ) -> WatchdogHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let interval = Duration::from_millis(config.watchdog_interval_ms);
        let threshold_ms = config.idle_threshold_ms;

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let freshness = controller.freshness();
                        if !should_renegotiate(
                            signaling.is_open(),
                            controller.rebuild_in_flight(),
                            freshness.last_packet_ms(),
                            freshness.now_ms(),
                            freshness.is_idle(),
                            threshold_ms,
                        ) {
                            continue;
                        }

                        // Only the not-idle -> idle edge triggers a rebuild.
                        if !freshness.mark_idle() {
                            continue;
                        }

                        info!("RTP idle detected, renegotiating");
                        controller.clear_pending_offer();
                        if let Err(e) = controller.create_session().await {
                            warn!("Renegotiation failed: {}", e);
                        }
                    }
                }
            }

            debug!("Idle watchdog stopped");
        });

        WatchdogHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Decide whether this tick should renegotiate
///
/// Skips entirely while the signaling channel is down or a rebuild is in
/// flight (renegotiation storms during startup/reconnection help nobody).
/// A zero timestamp means no packet has ever arrived, so there is nothing
/// to declare dead yet.
fn should_renegotiate(
    signaling_open: bool,
    rebuild_in_flight: bool,
    last_packet_ms: i64,
    now_ms: i64,
    already_idle: bool,
    threshold_ms: u64,
) -> bool {
    signaling_open
        && !rebuild_in_flight
        && last_packet_ms != 0
        && !already_idle
        && now_ms.saturating_sub(last_packet_ms) > threshold_ms as i64
}

/// Handle for cancelling the watchdog on teardown
pub struct WatchdogHandle {
    shutdown: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Stop the watchdog and wait for the loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 2000;

    #[test]
    fn test_quiet_stream_past_threshold_renegotiates() {
        assert!(should_renegotiate(true, false, 100, 2101, false, THRESHOLD));
    }

    #[test]
    fn test_skipped_while_channel_closed_or_rebuilding() {
        assert!(!should_renegotiate(false, false, 100, 2101, false, THRESHOLD));
        assert!(!should_renegotiate(true, true, 100, 2101, false, THRESHOLD));
    }

    #[test]
    fn test_never_fires_before_first_packet() {
        assert!(!should_renegotiate(true, false, 0, 1_000_000, false, THRESHOLD));
    }

    #[test]
    fn test_idle_detection_is_edge_triggered() {
        assert!(!should_renegotiate(true, false, 100, 2101, true, THRESHOLD));
    }

    #[test]
    fn test_fresh_stream_is_left_alone() {
        assert!(!should_renegotiate(true, false, 100, 2100, false, THRESHOLD));
        assert!(!should_renegotiate(true, false, 2000, 2100, false, THRESHOLD));
    }

    #[tokio::test]
    async fn test_shutdown_joins_the_loop() {
        let config = crate::config::BridgeConfig::default();
        let signaling = Arc::new(SignalingClient::new(config.signaling_url()));
        let controller = SessionController::new(config.clone(), Arc::clone(&signaling));

        let handle = IdleWatchdog::spawn(controller, signaling, &config);
        handle.shutdown().await;
    }
}
