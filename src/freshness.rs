//! Upstream liveness tracking
//!
//! UDP has no disconnect event, so renewed packet arrival is the only proof
//! that the producer is alive. The relay path stamps every accepted packet
//! here; the watchdog reads the stamp on its own cadence. Eventual
//! visibility within one watchdog tick is all that is required, so plain
//! atomics with no further ordering are used.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Instant;

/// Timestamp of the last forwarded packet plus the idle flag
pub struct FreshnessMarker {
    origin: Instant,
    last_packet_ms: AtomicI64,
    idle: AtomicBool,
}

impl FreshnessMarker {
    /// Create a marker that has never seen a packet (idle, timestamp zero)
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_packet_ms: AtomicI64::new(0),
            idle: AtomicBool::new(true),
        }
    }

    /// Milliseconds elapsed since this marker was created
    pub fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    /// Record a packet arrival and clear the idle flag
    pub fn touch(&self) {
        // 0 is the never-seen sentinel, so the first stamp is at least 1.
        self.last_packet_ms
            .store(self.now_ms().max(1), Ordering::Relaxed);
        self.idle.store(false, Ordering::Relaxed);
    }

    /// Timestamp of the last arrival in milliseconds, 0 if none yet
    pub fn last_packet_ms(&self) -> i64 {
        self.last_packet_ms.load(Ordering::Relaxed)
    }

    /// Whether the stream is currently considered idle
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Relaxed)
    }

    /// Set the idle flag, returning true only if this call made the
    /// not-idle to idle transition
    pub fn mark_idle(&self) -> bool {
        !self.idle.swap(true, Ordering::Relaxed)
    }
}

impl Default for FreshnessMarker {
    fn default() -> Self {
        Self::new()
    }
}
