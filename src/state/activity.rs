//! User activity tracking

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::Instant;
use tracing::warn;

/// Records the timestamp of the most recent user interaction.
///
/// Cloneable handle: input-event listeners call [`record`](Self::record),
/// the update coordinator only reads. Uses `tokio::time::Instant` so tests
/// can drive it with the paused runtime clock.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_activity: Arc<Mutex<Instant>>,
}

impl ActivityTracker {
    /// Create a tracker that counts construction time as the first interaction
    pub fn new() -> Self {
        Self {
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record a user interaction at the current instant
    pub fn record(&self) {
        match self.last_activity.lock() {
            Ok(mut last) => *last = Instant::now(),
            Err(e) => warn!("Failed to lock activity timestamp: {}", e),
        }
    }

    /// Time elapsed since the last recorded interaction
    pub fn idle_for(&self) -> Duration {
        match self.last_activity.lock() {
            Ok(last) => last.elapsed(),
            Err(e) => {
                // Treat an unreadable timestamp as "just active": the safe
                // outcome is a countdown, not a surprise reload.
                warn!("Failed to lock activity timestamp: {}", e);
                Duration::ZERO
            }
        }
    }

    /// Whether the user interacted more recently than `threshold` ago
    pub fn is_active(&self, threshold: Duration) -> bool {
        self.idle_for() < threshold
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}
