//! Error types for the update-coordination engine

use thiserror::Error;

/// Errors produced while checking versions or invalidating a stale session.
///
/// No variant is fatal to the host application: storage failures route to the
/// force-update path, and invalidation failures degrade to a plain reload.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Reading or writing the persisted version record failed.
    /// Treated as "no record", which routes to the force-update path.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Enumerating or deleting cache partitions failed.
    #[error("cache clear failed: {0}")]
    CacheClearFailure(String),

    /// Enumerating or unregistering background workers failed.
    #[error("worker unregister failed: {0}")]
    WorkerUnregisterFailure(String),

    /// A network fetch failed, either in the background worker or inside a
    /// caller-supplied confirmed-update handler.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Navigation to the cache-busted URL (or the plain reload) failed.
    #[error("navigation failed: {0}")]
    NavigationFailure(String),
}
