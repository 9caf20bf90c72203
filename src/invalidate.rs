//! Cache and worker invalidation

use std::{
    collections::HashMap,
    sync::Mutex,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::UpdateError;

/// A response body as held in a cache partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
}

impl CachedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Cache storage capability: named partitions of url-keyed responses,
/// shared at origin scope
#[async_trait]
pub trait CacheManager: Send + Sync {
    /// Whether cache storage exists in this session at all
    fn is_available(&self) -> bool {
        true
    }
    async fn partition_names(&self) -> Result<Vec<String>, UpdateError>;
    async fn delete_partition(&self, name: &str) -> Result<bool, UpdateError>;
    async fn read(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>, UpdateError>;
    async fn write(
        &self,
        partition: &str,
        url: &str,
        response: CachedResponse,
    ) -> Result<(), UpdateError>;
}

/// Background-worker registration capability
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Whether a worker registration facility exists in this session
    fn is_available(&self) -> bool {
        true
    }
    async fn registrations(&self) -> Result<Vec<String>, UpdateError>;
    async fn unregister(&self, id: &str) -> Result<bool, UpdateError>;
}

/// Page navigation capability. Both operations terminate the session on
/// success, so the executor treats them as final.
pub trait Navigator: Send + Sync {
    fn origin(&self) -> String;
    fn navigate(&self, url: &str) -> Result<(), UpdateError>;
    fn reload(&self) -> Result<(), UpdateError>;
}

/// Callback invoked just before a forced update starts
pub type ForceUpdateCallback = Box<dyn Fn() + Send + Sync>;
/// Caller-supplied handler that fully substitutes for the default
/// optional-update sequence
pub type UpdateConfirmedHandler =
    Box<dyn Fn() -> BoxFuture<'static, Result<(), UpdateError>> + Send + Sync>;

/// Performs the disruptive part of an update: clear caches, unregister
/// workers, reload with a cache-busting marker.
///
/// Used by both the force path ([`force_update`](Self::force_update)) and the
/// optional-update path ([`handle_update`](Self::handle_update)).
pub struct InvalidationExecutor<C, W, N> {
    cache: C,
    workers: W,
    navigator: N,
    on_force_update: Option<ForceUpdateCallback>,
    on_update_confirmed: Option<UpdateConfirmedHandler>,
}

impl<C, W, N> InvalidationExecutor<C, W, N>
where
    C: CacheManager,
    W: WorkerRegistry,
    N: Navigator,
{
    pub fn new(cache: C, workers: W, navigator: N) -> Self {
        Self {
            cache,
            workers,
            navigator,
            on_force_update: None,
            on_update_confirmed: None,
        }
    }

    /// Attach a fire-and-forget callback run before a forced update
    pub fn with_on_force_update(mut self, callback: ForceUpdateCallback) -> Self {
        self.on_force_update = Some(callback);
        self
    }

    /// Attach a confirmed-update handler that replaces the default sequence
    pub fn with_on_update_confirmed(mut self, handler: UpdateConfirmedHandler) -> Self {
        self.on_update_confirmed = Some(handler);
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn workers(&self) -> &W {
        &self.workers
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Mandatory invalidation: clear every cache partition, unregister every
    /// worker, then navigate to the origin with a cache-busting parameter.
    ///
    /// Any failure falls back to an unconditional plain reload, so this path
    /// never leaves the session half-invalidated; it always ends in
    /// navigation.
    pub async fn force_update(&self) {
        if let Some(callback) = &self.on_force_update {
            callback();
        }

        if let Err(e) = self.invalidate_and_navigate().await {
            error!("Error during force update: {}", e);
            if let Err(e) = self.navigator.reload() {
                error!("Fallback reload failed: {}", e);
            }
        }
    }

    async fn invalidate_and_navigate(&self) -> Result<(), UpdateError> {
        self.clear_all_caches().await?;
        self.unregister_all_workers().await?;

        let url = format!("{}?v={}", self.navigator.origin(), Utc::now().timestamp_millis());
        info!("Navigating to {} for a hard reload", url);
        self.navigator.navigate(&url)
    }

    /// Optional-update invalidation.
    ///
    /// When a confirmed-update handler was supplied its completion (or
    /// failure) fully substitutes for the default sequence; otherwise the
    /// default runs: unregister workers and plain reload, no cache clear.
    /// Returns `Err` so the caller can reset its in-progress flag and retry.
    pub async fn handle_update(&self) -> Result<(), UpdateError> {
        match &self.on_update_confirmed {
            Some(handler) => handler().await,
            None => {
                self.unregister_all_workers().await?;
                self.navigator.reload()
            }
        }
    }

    async fn clear_all_caches(&self) -> Result<(), UpdateError> {
        if !self.cache.is_available() {
            debug!("Cache storage unavailable, skipping cache clear");
            return Ok(());
        }

        for name in self.cache.partition_names().await? {
            self.cache.delete_partition(&name).await?;
            info!("Deleted cache partition: {}", name);
        }
        Ok(())
    }

    async fn unregister_all_workers(&self) -> Result<(), UpdateError> {
        if !self.workers.is_available() {
            debug!("Worker registry unavailable, skipping unregister");
            return Ok(());
        }

        for id in self.workers.registrations().await? {
            self.workers.unregister(&id).await?;
            info!("Unregistered background worker: {}", id);
        }
        Ok(())
    }
}

/// In-memory cache storage for tests and the demo session
#[derive(Debug, Default)]
pub struct MemoryCacheManager {
    partitions: Mutex<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, HashMap<String, CachedResponse>>>, UpdateError>
    {
        self.partitions
            .lock()
            .map_err(|e| UpdateError::CacheClearFailure(e.to_string()))
    }
}

#[async_trait]
impl CacheManager for MemoryCacheManager {
    async fn partition_names(&self) -> Result<Vec<String>, UpdateError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, UpdateError> {
        Ok(self.lock()?.remove(name).is_some())
    }

    async fn read(&self, partition: &str, url: &str) -> Result<Option<CachedResponse>, UpdateError> {
        Ok(self
            .lock()?
            .get(partition)
            .and_then(|entries| entries.get(url).cloned()))
    }

    async fn write(
        &self,
        partition: &str,
        url: &str,
        response: CachedResponse,
    ) -> Result<(), UpdateError> {
        self.lock()?
            .entry(partition.to_string())
            .or_default()
            .insert(url.to_string(), response);
        Ok(())
    }
}

/// In-memory worker registry for tests and the demo session
#[derive(Debug, Default)]
pub struct MemoryWorkerRegistry {
    ids: Mutex<Vec<String>>,
}

impl MemoryWorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.push(id.into());
        }
    }
}

#[async_trait]
impl WorkerRegistry for MemoryWorkerRegistry {
    async fn registrations(&self) -> Result<Vec<String>, UpdateError> {
        self.ids
            .lock()
            .map(|ids| ids.clone())
            .map_err(|e| UpdateError::WorkerUnregisterFailure(e.to_string()))
    }

    async fn unregister(&self, id: &str) -> Result<bool, UpdateError> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|e| UpdateError::WorkerUnregisterFailure(e.to_string()))?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        Ok(ids.len() != before)
    }
}

/// Navigator that records navigations instead of performing them. The demo
/// binary logs them; tests assert on them.
#[derive(Debug)]
pub struct RecordingNavigator {
    origin: String,
    navigations: Mutex<Vec<String>>,
    reloads: Mutex<u32>,
}

impl RecordingNavigator {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            navigations: Mutex::new(Vec::new()),
            reloads: Mutex::new(0),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads.lock().map(|count| *count).unwrap_or(0)
    }
}

impl Navigator for RecordingNavigator {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn navigate(&self, url: &str) -> Result<(), UpdateError> {
        info!("Session navigating to {}", url);
        self.navigations
            .lock()
            .map_err(|e| UpdateError::NavigationFailure(e.to_string()))?
            .push(url.to_string());
        Ok(())
    }

    fn reload(&self) -> Result<(), UpdateError> {
        warn!("Session falling back to a plain reload");
        *self
            .reloads
            .lock()
            .map_err(|e| UpdateError::NavigationFailure(e.to_string()))? += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    struct BrokenCache;

    #[async_trait]
    impl CacheManager for BrokenCache {
        async fn partition_names(&self) -> Result<Vec<String>, UpdateError> {
            Err(UpdateError::CacheClearFailure("enumeration failed".into()))
        }
        async fn delete_partition(&self, _name: &str) -> Result<bool, UpdateError> {
            Err(UpdateError::CacheClearFailure("delete failed".into()))
        }
        async fn read(
            &self,
            _partition: &str,
            _url: &str,
        ) -> Result<Option<CachedResponse>, UpdateError> {
            Ok(None)
        }
        async fn write(
            &self,
            _partition: &str,
            _url: &str,
            _response: CachedResponse,
        ) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    struct AbsentCache;

    #[async_trait]
    impl CacheManager for AbsentCache {
        fn is_available(&self) -> bool {
            false
        }
        async fn partition_names(&self) -> Result<Vec<String>, UpdateError> {
            panic!("must not be consulted when unavailable")
        }
        async fn delete_partition(&self, _name: &str) -> Result<bool, UpdateError> {
            panic!("must not be consulted when unavailable")
        }
        async fn read(
            &self,
            _partition: &str,
            _url: &str,
        ) -> Result<Option<CachedResponse>, UpdateError> {
            Ok(None)
        }
        async fn write(
            &self,
            _partition: &str,
            _url: &str,
            _response: CachedResponse,
        ) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_force_update_clears_everything_then_navigates() {
        let cache = MemoryCacheManager::new();
        cache
            .write("versynch-cache-v2.0.0", "/", CachedResponse::ok("old"))
            .await
            .unwrap();
        let workers = MemoryWorkerRegistry::new();
        workers.register("sw-1");

        let executor = InvalidationExecutor::new(cache, workers, RecordingNavigator::new("https://app.example"));
        executor.force_update().await;

        assert!(executor.cache.partition_names().await.unwrap().is_empty());
        assert!(executor.workers.registrations().await.unwrap().is_empty());
        let navigations = executor.navigator.navigations();
        assert_eq!(navigations.len(), 1);
        assert!(navigations[0].starts_with("https://app.example?v="));
        assert_eq!(executor.navigator.reload_count(), 0);
    }

    #[tokio::test]
    async fn test_force_update_failure_falls_back_to_plain_reload() {
        let executor = InvalidationExecutor::new(
            BrokenCache,
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        );
        executor.force_update().await;

        assert!(executor.navigator.navigations().is_empty());
        assert_eq!(executor.navigator.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_force_update_fires_callback_even_when_steps_fail() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let executor = InvalidationExecutor::new(
            BrokenCache,
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        )
        .with_on_force_update(Box::new(move || flag.store(true, Ordering::SeqCst)));

        executor.force_update().await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_cache_storage_is_skipped_not_fatal() {
        let executor = InvalidationExecutor::new(
            AbsentCache,
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        );
        executor.force_update().await;
        assert_eq!(executor.navigator.navigations().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_update_default_reloads_without_cache_clear() {
        let cache = MemoryCacheManager::new();
        cache
            .write("versynch-cache-v2.0.0", "/", CachedResponse::ok("old"))
            .await
            .unwrap();
        let workers = MemoryWorkerRegistry::new();
        workers.register("sw-1");

        let executor = InvalidationExecutor::new(cache, workers, RecordingNavigator::new("https://app.example"));
        executor.handle_update().await.unwrap();

        // Default optional-update path: workers gone, caches untouched
        assert!(executor.workers.registrations().await.unwrap().is_empty());
        assert_eq!(executor.cache.partition_names().await.unwrap().len(), 1);
        assert_eq!(executor.navigator.reload_count(), 1);
        assert!(executor.navigator.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_handler_substitutes_for_default_sequence() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let workers = MemoryWorkerRegistry::new();
        workers.register("sw-1");

        let executor = InvalidationExecutor::new(
            MemoryCacheManager::new(),
            workers,
            RecordingNavigator::new("https://app.example"),
        )
        .with_on_update_confirmed(Box::new(move || {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
        }));

        executor.handle_update().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
        // The handler replaced the default sequence entirely
        assert_eq!(executor.workers.registrations().await.unwrap().len(), 1);
        assert_eq!(executor.navigator.reload_count(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_handler_failure_propagates_for_retry() {
        let executor = InvalidationExecutor::new(
            MemoryCacheManager::new(),
            MemoryWorkerRegistry::new(),
            RecordingNavigator::new("https://app.example"),
        )
        .with_on_update_confirmed(Box::new(|| {
            Box::pin(async { Err(UpdateError::NetworkFailure("download failed".into())) })
        }));

        assert!(executor.handle_update().await.is_err());
    }
}
