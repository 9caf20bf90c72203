//! Forced-update background task

use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::info;

use crate::invalidate::{CacheManager, InvalidationExecutor, Navigator, WorkerRegistry};

/// Schedule a forced update after the UI-settle delay.
///
/// The delay gives the host a moment to render its fallback screen before
/// the session is torn down. Dropping or aborting the returned handle before
/// it fires cancels the update.
pub fn force_update_after<C, W, N>(
    executor: Arc<InvalidationExecutor<C, W, N>>,
    delay: Duration,
) -> JoinHandle<()>
where
    C: CacheManager + 'static,
    W: WorkerRegistry + 'static,
    N: Navigator + 'static,
{
    info!("Force update scheduled in {:?}", delay);
    tokio::spawn(async move {
        sleep(delay).await;
        executor.force_update().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalidate::{MemoryCacheManager, MemoryWorkerRegistry, RecordingNavigator};

    #[tokio::test(start_paused = true)]
    async fn test_forced_update_fires_after_the_settle_delay() {
        let executor = Arc::new(InvalidationExecutor::new(
            MemoryCacheManager::new(),
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        ));

        let task = force_update_after(Arc::clone(&executor), Duration::from_millis(3_000));
        task.await.unwrap();

        let navigations = executor.navigator().navigations();
        assert_eq!(navigations.len(), 1);
        assert!(navigations[0].starts_with("https://app.example?v="));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborting_before_the_delay_cancels_the_update() {
        let executor = Arc::new(InvalidationExecutor::new(
            MemoryCacheManager::new(),
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        ));

        let task = force_update_after(Arc::clone(&executor), Duration::from_millis(3_000));
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(executor.navigator().navigations().is_empty());
        assert_eq!(executor.navigator().reload_count(), 0);
    }
}
