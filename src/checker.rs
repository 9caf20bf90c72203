//! Version staleness checks

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::state::{SessionState, UpdateDecision, VersionRecord};
use crate::store::{KeyValueStore, VersionStore};

/// Callback invoked when an update first becomes available
pub type UpdateAvailableCallback = Box<dyn Fn() + Send + Sync>;

/// Compares the persisted version record against the version the host
/// application was shipped with and classifies the transition.
///
/// Not re-entrant: overlapping checks in the same session are undefined, so
/// callers serialize them (mount, foreground transition, worker broadcast).
pub struct VersionChecker<S: KeyValueStore> {
    state: Arc<SessionState>,
    store: VersionStore<S>,
    /// The record the currently running host application presents
    current: VersionRecord,
    on_update_available: Option<UpdateAvailableCallback>,
}

impl<S: KeyValueStore> VersionChecker<S> {
    pub fn new(state: Arc<SessionState>, store: VersionStore<S>, current: VersionRecord) -> Self {
        Self {
            state,
            store,
            current,
            on_update_available: None,
        }
    }

    /// Attach a callback fired exactly when availability transitions to true
    pub fn with_on_update_available(mut self, callback: UpdateAvailableCallback) -> Self {
        self.on_update_available = Some(callback);
        self
    }

    /// The record the host application presented at construction
    pub fn current(&self) -> &VersionRecord {
        &self.current
    }

    /// Classify the persisted record against the current one.
    ///
    /// A missing record, an unreadable store, or a persisted build below
    /// `min_build_to_force_update` all force an update; availability is not
    /// evaluated on that path. Otherwise an update is available when the
    /// persisted version string differs or the persisted build is older.
    ///
    /// Both branches overwrite the persisted record with the current one, so
    /// an immediate second check observes its own write and reports no
    /// pending update.
    pub fn check_for_updates(&self) -> UpdateDecision {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Version store unreadable, treating as missing record: {}", e);
                None
            }
        };

        self.state.touch_last_checked();

        let decision = match stored {
            Some(persisted)
                if persisted.build >= self.state.options.min_build_to_force_update =>
            {
                let needs_update = persisted.version != self.current.version
                    || persisted.build < self.current.build;
                debug!(
                    "Version check: persisted {} (build {}) vs current {} (build {}), update available: {}",
                    persisted.version, persisted.build,
                    self.current.version, self.current.build,
                    needs_update
                );
                UpdateDecision::available(needs_update)
            }
            Some(persisted) => {
                info!(
                    "Persisted build {} is below minimum supported build {}, forcing update",
                    persisted.build, self.state.options.min_build_to_force_update
                );
                UpdateDecision::force()
            }
            None => {
                info!("No persisted version record, forcing update");
                UpdateDecision::force()
            }
        };

        if decision.is_force_update {
            if let Err(e) = self.state.mark_force_update() {
                warn!("Failed to record force-update decision: {}", e);
            }
        } else {
            // The decision is recomputed on every check; a force flag from an
            // earlier check must not outlive this classification
            if let Err(e) = self.state.clear_force_update() {
                warn!("Failed to clear force-update decision: {}", e);
            }
            self.publish_availability(decision.is_update_available);
        }

        // Overwrite regardless of the decision reached
        if let Err(e) = self.store.save(&self.current) {
            warn!("Failed to persist current version record: {}", e);
        }

        decision
    }

    /// Short-circuit path for a worker broadcast: the background worker is
    /// the authority on "a new version is already installed", so availability
    /// is set directly without consulting the persisted record.
    pub fn note_worker_update(&self, version: &str, build: u32) {
        info!(
            "Background worker reported new version {} (build {})",
            version, build
        );
        self.publish_availability(true);
    }

    fn publish_availability(&self, available: bool) {
        match self.state.set_update_available(available) {
            Ok(transitioned) => {
                if transitioned {
                    if let Some(callback) = &self.on_update_available {
                        callback();
                    }
                }
            }
            Err(e) => warn!("Failed to update availability: {}", e),
        }
    }
}
