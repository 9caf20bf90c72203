//! Background sync worker lifecycle

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::UpdateError;
use crate::invalidate::{CacheManager, CachedResponse};
use crate::state::VersionRecord;
use super::protocol::{Envelope, WorkerMessage};

/// Prefix shared by every cache partition this app owns
pub const CACHE_PREFIX: &str = "versynch-cache-";

/// Name of the cache partition for a given version
pub fn partition_name(version: &str) -> String {
    format!("{}v{}", CACHE_PREFIX, version)
}

/// A request passing through the worker's fetch path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Network fetch capability used by the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, UpdateError>;
}

/// Out-of-page execution context that owns the cache partitions, pre-caches
/// assets for a version-tagged partition, and broadcasts `SW_UPDATED` to
/// every open tab when it activates a new version.
pub struct BackgroundSyncWorker<C, F> {
    version: VersionRecord,
    precache_resources: Vec<String>,
    cache: C,
    fetcher: F,
    /// When this worker build was created, echoed in `VERSION_INFO`
    build_timestamp: i64,
    activated: AtomicBool,
    /// Channel every open tab subscribes to
    broadcast_tx: broadcast::Sender<WorkerMessage>,
}

impl<C, F> BackgroundSyncWorker<C, F>
where
    C: CacheManager,
    F: Fetcher,
{
    pub fn new(
        version: VersionRecord,
        precache_resources: Vec<String>,
        cache: C,
        fetcher: F,
    ) -> Self {
        let (broadcast_tx, _) = broadcast::channel(16);
        Self {
            version,
            precache_resources,
            cache,
            fetcher,
            build_timestamp: Utc::now().timestamp_millis(),
            activated: AtomicBool::new(false),
            broadcast_tx,
        }
    }

    /// The cache partition this worker version owns
    pub fn partition(&self) -> String {
        partition_name(&self.version.version)
    }

    /// Subscribe a tab to worker → tab broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Install: pre-cache the fixed resource list into this version's
    /// partition and skip the normal waiting period. Pre-cache failures are
    /// logged, never fatal.
    pub async fn install(&self) {
        info!(
            "Installing background worker for version {} (build {})",
            self.version.version, self.version.build
        );

        let partition = self.partition();
        for url in &self.precache_resources {
            match self.fetcher.fetch(&FetchRequest::get(url.clone())).await {
                Ok(response) if response.is_success() => {
                    if let Err(e) = self.cache.write(&partition, url, response).await {
                        warn!("Failed to pre-cache {}: {}", url, e);
                    }
                }
                Ok(response) => {
                    warn!("Pre-cache of {} skipped (status {})", url, response.status);
                }
                Err(e) => warn!("Pre-cache fetch of {} failed: {}", url, e),
            }
        }

        // Skip waiting so the new worker activates immediately
        debug!("Skipping waiting period");
    }

    /// Activate: claim all open contexts, delete every stale partition with
    /// this app's prefix, and broadcast `SW_UPDATED` to every open tab.
    pub async fn activate(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            debug!("Worker already activated");
            return;
        }

        info!("Activating background worker for version {}", self.version.version);

        // Claiming contexts is implicit here: every subscribed tab receives
        // the broadcast below.
        let current = self.partition();
        match self.cache.partition_names().await {
            Ok(names) => {
                for name in names {
                    if name.starts_with(CACHE_PREFIX) && name != current {
                        match self.cache.delete_partition(&name).await {
                            Ok(_) => info!("Deleted old cache partition: {}", name),
                            Err(e) => warn!("Failed to delete partition {}: {}", name, e),
                        }
                    }
                }
            }
            Err(e) => warn!("Failed to enumerate cache partitions: {}", e),
        }

        let notice = WorkerMessage::SwUpdated {
            version: self.version.version.clone(),
            build: self.version.build,
            timestamp: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.broadcast_tx.send(notice) {
            debug!("No open tabs to notify: {}", e);
        }
    }

    /// Fetch path: matching GET requests are served cache-first, misses go to
    /// the network, and successful GET responses are stored opportunistically
    /// into the current partition. Non-GET and non-200 responses pass
    /// through uncached.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<CachedResponse, UpdateError> {
        let partition = self.partition();

        if request.is_get() {
            match self.cache.read(&partition, &request.url).await {
                Ok(Some(cached)) => {
                    debug!("Cache hit for {}", request.url);
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache read for {} failed: {}", request.url, e),
            }
        }

        let response = self.fetcher.fetch(request).await?;

        if request.is_get() && response.is_success() {
            if let Err(e) = self
                .cache
                .write(&partition, &request.url, response.clone())
                .await
            {
                warn!("Failed to cache {}: {}", request.url, e);
            }
        }
        Ok(response)
    }

    /// Message loop over the tab → worker channel
    pub async fn run(&self, mut inbox: mpsc::Receiver<Envelope>) {
        info!("Starting background worker message loop");

        while let Some(envelope) = inbox.recv().await {
            match envelope.message {
                WorkerMessage::VersionCheck => {
                    let reply = WorkerMessage::VersionInfo {
                        version: self.version.version.clone(),
                        build: self.version.build,
                        timestamp: self.build_timestamp,
                    };
                    match envelope.reply {
                        Some(port) => {
                            if port.send(reply).is_err() {
                                warn!("Version check reply port closed");
                            }
                        }
                        None => warn!("Version check arrived without a reply port"),
                    }
                }
                WorkerMessage::SkipWaiting => {
                    info!("Skip-waiting requested by a tab");
                    self.activate().await;
                }
                other => {
                    error!("Unexpected message in worker inbox: {:?}", other);
                }
            }
        }

        debug!("Worker inbox closed, message loop ending");
    }
}

/// Fetcher backed by a fixed url → response table; anything else is a 404.
/// Used by the demo session and tests.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, CachedResponse>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: impl Into<String>, response: CachedResponse) -> Self {
        self.responses.insert(url.into(), response);
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, UpdateError> {
        Ok(self
            .responses
            .get(&request.url)
            .cloned()
            .unwrap_or(CachedResponse {
                status: 404,
                body: String::new(),
            }))
    }
}
