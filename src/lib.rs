//! Versynch - keep a long-lived client session in sync with the shipped version
//!
//! This library provides the update-coordination engine for sessions that
//! stay open for hours or days: the version-staleness decision policy, the
//! activity-gated countdown/postpone state machine, and the cache and
//! background-worker invalidation protocol with cross-tab broadcast.

pub mod checker;
pub mod config;
pub mod error;
pub mod invalidate;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use checker::VersionChecker;
pub use config::{Config, UpdateOptions};
pub use error::UpdateError;
pub use invalidate::{CacheManager, InvalidationExecutor, Navigator, WorkerRegistry};
pub use state::{ActivityTracker, CountdownState, SessionState, UpdateDecision, VersionRecord};
pub use store::{FileStore, KeyValueStore, MemoryStore, VersionStore};
pub use tasks::{CoordinatorPhase, UpdateCoordinator};
pub use utils::shutdown_signal;
pub use worker::{BackgroundSyncWorker, WorkerMessage};
