//! Worker broadcast listener task

use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::checker::VersionChecker;
use crate::store::KeyValueStore;
use crate::worker::WorkerMessage;

/// Listen for `SW_UPDATED` broadcasts from the background worker and
/// short-circuit them into the checker's availability state.
pub fn spawn_sw_message_task<S>(
    checker: Arc<VersionChecker<S>>,
    mut broadcasts: broadcast::Receiver<WorkerMessage>,
) -> JoinHandle<()>
where
    S: KeyValueStore + 'static,
{
    tokio::spawn(async move {
        info!("Starting worker broadcast listener");
        loop {
            match broadcasts.recv().await {
                Ok(WorkerMessage::SwUpdated { version, build, .. }) => {
                    checker.note_worker_update(&version, build);
                }
                Ok(other) => debug!("Ignoring worker broadcast: {:?}", other),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Worker broadcast listener lagged by {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Worker broadcast channel closed, listener ending");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::UpdateOptions;
    use crate::invalidate::{CachedResponse, MemoryCacheManager};
    use crate::state::{SessionState, VersionRecord};
    use crate::store::{MemoryStore, VersionStore};
    use crate::worker::{BackgroundSyncWorker, StaticFetcher};

    #[tokio::test]
    async fn test_worker_activation_reaches_the_checker() {
        let state = Arc::new(SessionState::new(UpdateOptions::default()));
        let checker = Arc::new(VersionChecker::new(
            Arc::clone(&state),
            VersionStore::new(MemoryStore::new()),
            VersionRecord::new("2.1.0", 210),
        ));

        let worker = BackgroundSyncWorker::new(
            VersionRecord::new("3.0.0", 300),
            vec!["/".to_string()],
            MemoryCacheManager::new(),
            StaticFetcher::new().with_response("/", CachedResponse::ok("index")),
        );

        let mut availability = state.subscribe_availability();
        let task = spawn_sw_message_task(checker, worker.subscribe());

        worker.install().await;
        worker.activate().await;

        availability.changed().await.unwrap();
        assert!(*availability.borrow());
        task.abort();
    }
}
