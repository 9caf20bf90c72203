//! Countdown state structure for the optional-update path

use std::time::Duration;

/// Number of whole seconds a countdown of the given duration is seeded with
pub fn countdown_seconds(countdown_duration: Duration) -> u64 {
    countdown_duration.as_secs_f64().round() as u64
}

/// Countdown and postpone bookkeeping for an offered (non-forced) update.
///
/// Owned by the update coordinator and reset to initial values whenever the
/// update stops being available. `is_update_in_progress` and `is_postponed`
/// are never both true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownState {
    /// Seconds left before the update fires automatically
    pub remaining_seconds: u64,
    /// How many times the update has been postponed, capped by configuration
    pub postpone_count: u32,
    /// Whether the user (or expiry policy) postponed the pending update
    pub is_postponed: bool,
    /// Whether an update is currently being applied
    pub is_update_in_progress: bool,
}

impl CountdownState {
    /// Create a fresh state seeded with the full countdown duration
    pub fn new(countdown_duration: Duration) -> Self {
        Self {
            remaining_seconds: countdown_seconds(countdown_duration),
            postpone_count: 0,
            is_postponed: false,
            is_update_in_progress: false,
        }
    }

    /// Reset every field to its initial value
    pub fn reset(&mut self, countdown_duration: Duration) {
        *self = Self::new(countdown_duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_seconds_rounds_to_nearest() {
        assert_eq!(countdown_seconds(Duration::from_millis(60_000)), 60);
        assert_eq!(countdown_seconds(Duration::from_millis(5_000)), 5);
        assert_eq!(countdown_seconds(Duration::from_millis(1_499)), 1);
        assert_eq!(countdown_seconds(Duration::from_millis(1_500)), 2);
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut state = CountdownState::new(Duration::from_secs(60));
        state.remaining_seconds = 3;
        state.postpone_count = 2;
        state.is_postponed = true;
        state.reset(Duration::from_secs(60));
        assert_eq!(state, CountdownState::new(Duration::from_secs(60)));
    }
}
