//! Shared session state management

use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::UpdateOptions;
use super::{ActivityTracker, CountdownState, UpdateDecision};

/// Shared state for one client session: the current update decision, the
/// activity tracker, and the countdown bookkeeping, plus notification
/// channels collaborators subscribe to.
///
/// Availability changes go out on a `watch` channel so the coordinator can
/// reset itself when an update stops being available; countdown changes go
/// out on their own `watch` channel for UI consumption.
#[derive(Debug)]
pub struct SessionState {
    /// Engine configuration
    pub options: UpdateOptions,
    /// Last interaction timestamp, updated by input-event listeners
    pub activity: ActivityTracker,
    /// Current update decision flags
    decision: Mutex<UpdateDecision>,
    /// When the last version check ran
    last_checked: Mutex<DateTime<Utc>>,
    /// Countdown and postpone bookkeeping
    countdown: Mutex<CountdownState>,
    /// Channel for update-availability changes
    availability_tx: watch::Sender<bool>,
    /// Channel for countdown updates
    countdown_tx: watch::Sender<CountdownState>,
    /// Keep the receivers alive to prevent channel closure
    _availability_rx: watch::Receiver<bool>,
    _countdown_rx: watch::Receiver<CountdownState>,
}

impl SessionState {
    /// Create a new SessionState with default flags for the given options
    pub fn new(options: UpdateOptions) -> Self {
        let (availability_tx, availability_rx) = watch::channel(false);
        let (countdown_tx, countdown_rx) =
            watch::channel(CountdownState::new(options.countdown_duration));
        let countdown = CountdownState::new(options.countdown_duration);

        Self {
            options,
            activity: ActivityTracker::new(),
            decision: Mutex::new(UpdateDecision::default()),
            last_checked: Mutex::new(Utc::now()),
            countdown: Mutex::new(countdown),
            availability_tx,
            countdown_tx,
            _availability_rx: availability_rx,
            _countdown_rx: countdown_rx,
        }
    }

    /// Set whether an update is available.
    ///
    /// Returns `true` when this call transitioned availability from false to
    /// true, so the caller can fire its notification exactly once. When an
    /// update stops being available, the countdown state is reset to its
    /// initial values.
    pub fn set_update_available(&self, available: bool) -> Result<bool, String> {
        let transitioned = {
            let mut decision = self
                .decision
                .lock()
                .map_err(|e| format!("Failed to lock decision state: {}", e))?;
            let transitioned = available && !decision.is_update_available;
            decision.is_update_available = available;
            transitioned
        };

        if !available {
            self.update_countdown(|countdown| {
                countdown.reset(self.options.countdown_duration);
            })?;
        }

        if let Err(e) = self.availability_tx.send(available) {
            warn!("Failed to send availability change: {}", e);
        }

        if transitioned {
            info!("Update became available");
        }
        Ok(transitioned)
    }

    /// Record that the current session must be force-updated
    pub fn mark_force_update(&self) -> Result<(), String> {
        let mut decision = self
            .decision
            .lock()
            .map_err(|e| format!("Failed to lock decision state: {}", e))?;
        decision.is_force_update = true;
        Ok(())
    }

    /// Clear the force-update flag; called by a later check that classified
    /// the session as supported
    pub fn clear_force_update(&self) -> Result<(), String> {
        let mut decision = self
            .decision
            .lock()
            .map_err(|e| format!("Failed to lock decision state: {}", e))?;
        decision.is_force_update = false;
        Ok(())
    }

    /// Get the current update decision
    pub fn decision(&self) -> Result<UpdateDecision, String> {
        self.decision
            .lock()
            .map(|decision| *decision)
            .map_err(|e| format!("Failed to lock decision state: {}", e))
    }

    /// Whether an optional update is currently available
    pub fn is_update_available(&self) -> bool {
        self.decision()
            .map(|decision| decision.is_update_available)
            .unwrap_or(false)
    }

    /// Get the current countdown state
    pub fn countdown_state(&self) -> Result<CountdownState, String> {
        self.countdown
            .lock()
            .map(|countdown| countdown.clone())
            .map_err(|e| format!("Failed to lock countdown state: {}", e))
    }

    /// Apply an update to the countdown state and notify watchers
    pub fn update_countdown<F>(&self, updater: F) -> Result<CountdownState, String>
    where
        F: FnOnce(&mut CountdownState),
    {
        let new_state = {
            let mut countdown = self
                .countdown
                .lock()
                .map_err(|e| format!("Failed to lock countdown state: {}", e))?;
            updater(&mut countdown);
            countdown.clone()
        };

        if let Err(e) = self.countdown_tx.send(new_state.clone()) {
            warn!("Failed to send countdown update: {}", e);
        }
        Ok(new_state)
    }

    /// Stamp the in-memory "last checked" timestamp with the current time
    pub fn touch_last_checked(&self) {
        match self.last_checked.lock() {
            Ok(mut last) => *last = Utc::now(),
            Err(e) => warn!("Failed to lock last-checked timestamp: {}", e),
        }
    }

    /// When the last version check ran
    pub fn last_checked(&self) -> Result<DateTime<Utc>, String> {
        self.last_checked
            .lock()
            .map(|last| *last)
            .map_err(|e| format!("Failed to lock last-checked timestamp: {}", e))
    }

    /// Subscribe to update-availability changes
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.availability_tx.subscribe()
    }

    /// Subscribe to countdown updates
    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownState> {
        self.countdown_tx.subscribe()
    }
}

/// Convenience constructor used by the demo binary and tests
pub fn shared_session(options: UpdateOptions) -> Arc<SessionState> {
    Arc::new(SessionState::new(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_availability_transition_reported_once() {
        let state = SessionState::new(UpdateOptions::default());
        assert!(state.set_update_available(true).unwrap());
        assert!(!state.set_update_available(true).unwrap());
        assert!(!state.set_update_available(false).unwrap());
        assert!(state.set_update_available(true).unwrap());
    }

    #[tokio::test]
    async fn test_losing_availability_resets_countdown() {
        let state = SessionState::new(UpdateOptions::default());
        state.set_update_available(true).unwrap();
        state
            .update_countdown(|countdown| {
                countdown.remaining_seconds = 5;
                countdown.postpone_count = 2;
                countdown.is_postponed = true;
            })
            .unwrap();

        state.set_update_available(false).unwrap();
        let countdown = state.countdown_state().unwrap();
        assert_eq!(countdown.remaining_seconds, 60);
        assert_eq!(countdown.postpone_count, 0);
        assert!(!countdown.is_postponed);
        assert!(!countdown.is_update_in_progress);
    }

    #[tokio::test]
    async fn test_watchers_observe_countdown_changes() {
        let state = SessionState::new(UpdateOptions::default());
        let mut rx = state.subscribe_countdown();
        state
            .update_countdown(|countdown| countdown.remaining_seconds = 42)
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().remaining_seconds, 42);
    }
}
