//! Background worker module
//!
//! The out-of-page execution context that owns the cache partitions, plus the
//! message protocol it shares with open tabs.

pub mod protocol;
pub mod sync_worker;

// Re-export main types
pub use protocol::{Envelope, WorkerMessage};
pub use sync_worker::{
    partition_name, BackgroundSyncWorker, FetchRequest, Fetcher, StaticFetcher, CACHE_PREFIX,
};
