//! Update coordination state machine

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, error, info, warn};

use crate::invalidate::{CacheManager, InvalidationExecutor, Navigator, WorkerRegistry};
use crate::state::{countdown_seconds, SessionState};

/// Where the coordinator currently is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorPhase {
    Idle,
    CountingDown,
    Postponed,
    Updating,
}

/// Callback invoked when the user (or expiry policy) postpones an update
pub type UpdatePostponedCallback = Box<dyn Fn() + Send + Sync>;

/// Decides *when* to invalidate for an optional update: runs the countdown,
/// honors postpones up to the configured cap, and defers to the executor for
/// the disruptive part.
///
/// Cheap to clone; clones share the same state machine. The countdown task
/// exists exactly while the machine is counting down, and every exit path
/// (postpone, reset, update) releases it.
pub struct UpdateCoordinator<C, W, N> {
    state: Arc<SessionState>,
    executor: Arc<InvalidationExecutor<C, W, N>>,
    on_update_postponed: Option<Arc<UpdatePostponedCallback>>,
    countdown_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<C, W, N> Clone for UpdateCoordinator<C, W, N> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            executor: Arc::clone(&self.executor),
            on_update_postponed: self.on_update_postponed.clone(),
            countdown_task: Arc::clone(&self.countdown_task),
        }
    }
}

impl<C, W, N> UpdateCoordinator<C, W, N>
where
    C: CacheManager + 'static,
    W: WorkerRegistry + 'static,
    N: Navigator + 'static,
{
    pub fn new(state: Arc<SessionState>, executor: Arc<InvalidationExecutor<C, W, N>>) -> Self {
        Self {
            state,
            executor,
            on_update_postponed: None,
            countdown_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach a callback fired on every non-forced postpone
    pub fn with_on_update_postponed(mut self, callback: UpdatePostponedCallback) -> Self {
        self.on_update_postponed = Some(Arc::new(callback));
        self
    }

    /// Arm the automatic update process.
    ///
    /// No-op unless an update is available and neither in progress nor
    /// postponed. An active user gets a fresh countdown; an inactive user
    /// gets the update immediately, no countdown observed.
    pub async fn start_auto_update_process(&self) {
        let countdown = match self.state.countdown_state() {
            Ok(countdown) => countdown,
            Err(e) => {
                error!("Failed to read countdown state: {}", e);
                return;
            }
        };
        if !self.state.is_update_available()
            || countdown.is_update_in_progress
            || countdown.is_postponed
        {
            debug!("Auto update process not armed (unavailable, in progress, or postponed)");
            return;
        }

        let options = &self.state.options;
        if self.state.activity.is_active(options.inactivity_threshold) {
            // User is active: seed the countdown and start ticking
            let seconds = countdown_seconds(options.countdown_duration);
            if let Err(e) = self
                .state
                .update_countdown(|countdown| countdown.remaining_seconds = seconds)
            {
                error!("Failed to seed countdown: {}", e);
                return;
            }

            info!("User is active, starting {}s update countdown", seconds);
            self.cancel_countdown();
            let coordinator = self.clone();
            let handle = tokio::spawn(async move { coordinator.countdown_loop().await });
            match self.countdown_task.lock() {
                Ok(mut task) => *task = Some(handle),
                Err(e) => {
                    error!("Failed to store countdown task: {}", e);
                    handle.abort();
                }
            }
        } else {
            info!("User is inactive, updating immediately");
            self.handle_update().await;
        }
    }

    /// 1-second-granularity countdown. At zero the user's activity is
    /// re-checked: still active re-arms as a silent postpone (the countdown
    /// does not restart by itself), now inactive fires the update.
    async fn countdown_loop(&self) {
        let mut ticker = interval(Duration::from_secs(1));
        // The first tick completes immediately; the first decrement
        // belongs one full second out.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let remaining = match self.state.update_countdown(|countdown| {
                if countdown.remaining_seconds > 0 {
                    countdown.remaining_seconds -= 1;
                }
            }) {
                Ok(countdown) => countdown.remaining_seconds,
                Err(e) => {
                    error!("Failed to tick countdown: {}", e);
                    continue;
                }
            };
            debug!("Countdown tick: {}s remaining", remaining);

            if remaining == 0 {
                self.clear_countdown_handle();

                let threshold = self.state.options.inactivity_threshold;
                if self.state.activity.is_active(threshold) {
                    // The user kept interacting through the whole countdown:
                    // spend a postpone on their behalf instead of yanking the
                    // session out from under them.
                    info!("Countdown expired while user is active, postponing");
                    let seconds = countdown_seconds(self.state.options.countdown_duration);
                    if let Err(e) = self
                        .state
                        .update_countdown(|countdown| countdown.remaining_seconds = seconds)
                    {
                        warn!("Failed to reseed countdown: {}", e);
                    }
                    self.apply_postpone().await;
                } else {
                    info!("Countdown expired and user is inactive, updating");
                    self.handle_update().await;
                }
                break;
            }
        }
    }

    /// Postpone the pending update, or force it through once the postpone
    /// cap has been spent
    pub async fn postpone_update(&self) {
        self.cancel_countdown();
        self.apply_postpone().await;
    }

    async fn apply_postpone(&self) {
        let postpone_count = match self.state.countdown_state() {
            Ok(countdown) => countdown.postpone_count,
            Err(e) => {
                error!("Failed to read countdown state: {}", e);
                return;
            }
        };

        if postpone_count < self.state.options.max_postpone_count {
            if let Err(e) = self.state.update_countdown(|countdown| {
                countdown.is_postponed = true;
                countdown.postpone_count += 1;
            }) {
                error!("Failed to record postpone: {}", e);
                return;
            }
            info!(
                "Update postponed ({} of {})",
                postpone_count + 1,
                self.state.options.max_postpone_count
            );
            if let Some(callback) = &self.on_update_postponed {
                callback();
            }
        } else {
            info!("Postpone cap reached, forcing the update through");
            self.handle_update().await;
        }
    }

    /// Apply the pending update now.
    ///
    /// On success the session navigates away and `Updating` is terminal. On
    /// a handled failure `is_update_in_progress` resets so the update stays
    /// retryable.
    pub async fn handle_update(&self) {
        if !self.state.is_update_available() {
            debug!("No update available, nothing to apply");
            return;
        }

        self.cancel_countdown();
        if let Err(e) = self.state.update_countdown(|countdown| {
            countdown.is_update_in_progress = true;
            countdown.is_postponed = false;
        }) {
            error!("Failed to mark update in progress: {}", e);
            return;
        }

        match self.executor.handle_update().await {
            Ok(()) => info!("Update applied, session reloading"),
            Err(e) => {
                error!("Error during update: {}", e);
                if let Err(e) = self
                    .state
                    .update_countdown(|countdown| countdown.is_update_in_progress = false)
                {
                    error!("Failed to reset in-progress flag: {}", e);
                }
            }
        }
    }

    /// Background task that returns the machine to `Idle` whenever the
    /// update stops being available
    pub fn spawn_reset_task(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut availability = coordinator.state.subscribe_availability();
            loop {
                if availability.changed().await.is_err() {
                    break;
                }
                if !*availability.borrow() {
                    // SessionState already reset the countdown fields; the
                    // timer is ours to release.
                    debug!("Update no longer available, cancelling countdown");
                    coordinator.cancel_countdown();
                }
            }
        })
    }

    /// Current position in the state machine
    pub fn phase(&self) -> CoordinatorPhase {
        let countdown = match self.state.countdown_state() {
            Ok(countdown) => countdown,
            Err(_) => return CoordinatorPhase::Idle,
        };
        if countdown.is_update_in_progress {
            CoordinatorPhase::Updating
        } else if countdown.is_postponed {
            CoordinatorPhase::Postponed
        } else if self.countdown_running() {
            CoordinatorPhase::CountingDown
        } else {
            CoordinatorPhase::Idle
        }
    }

    fn countdown_running(&self) -> bool {
        self.countdown_task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Abort the countdown task if one is running
    fn cancel_countdown(&self) {
        match self.countdown_task.lock() {
            Ok(mut task) => {
                if let Some(handle) = task.take() {
                    handle.abort();
                    debug!("Countdown timer cancelled");
                }
            }
            Err(e) => error!("Failed to lock countdown task handle: {}", e),
        }
    }

    /// Drop the stored handle without aborting; called by the countdown task
    /// itself when it finishes naturally
    fn clear_countdown_handle(&self) {
        if let Ok(mut task) = self.countdown_task.lock() {
            task.take();
        }
    }
}
