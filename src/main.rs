//! Versynch - demo session
//!
//! Simulates one long-lived client tab: a version check on mount, a
//! background worker shipping a newer version, and the countdown-driven
//! update that follows.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use versynch::{
    checker::VersionChecker,
    config::Config,
    invalidate::{CachedResponse, InvalidationExecutor, MemoryCacheManager, MemoryWorkerRegistry, RecordingNavigator},
    state::{session::shared_session, SessionState, VersionRecord},
    store::{FileStore, VersionStore},
    tasks::{force_update_after, spawn_sw_message_task, UpdateCoordinator},
    utils::shutdown_signal,
    worker::{BackgroundSyncWorker, Envelope, StaticFetcher, WorkerMessage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("versynch={}", config.log_level()))
        .init();

    info!("Starting versynch demo session v2.1.0");
    info!(
        "Configuration: version={}, build={}, countdown={}ms, inactivity={}ms, max_postpones={}",
        config.app_version,
        config.build,
        config.countdown_ms,
        config.inactivity_ms,
        config.max_postpone_count
    );

    let options = config.options();
    let update_delay = options.update_delay;
    let state = shared_session(options);

    let store = VersionStore::new(FileStore::new(&config.store_path));
    let checker = Arc::new(
        VersionChecker::new(Arc::clone(&state), store, config.current_record())
            .with_on_update_available(Box::new(|| info!("Host notified: update available"))),
    );

    // Simulated browser singletons
    let registry = MemoryWorkerRegistry::new();
    registry.register("sw-main");
    let executor = Arc::new(InvalidationExecutor::new(
        MemoryCacheManager::new(),
        registry,
        RecordingNavigator::new("https://app.example"),
    ));

    // Version check on mount
    let decision = checker.check_for_updates();
    info!(
        "Initial check: force={}, available={}",
        decision.is_force_update, decision.is_update_available
    );

    if decision.is_force_update {
        info!("Session below minimum supported build, forcing update");
        force_update_after(executor, update_delay).await?;
        info!("Forced update complete, session would reload here");
        return Ok(());
    }

    // A newer version's worker comes up alongside the running session
    let worker = Arc::new(BackgroundSyncWorker::new(
        VersionRecord::new("3.0.0", 300),
        vec!["/".to_string(), "/static/js/main.bundle.js".to_string()],
        MemoryCacheManager::new(),
        StaticFetcher::new()
            .with_response("/", CachedResponse::ok("<html>index</html>"))
            .with_response("/static/js/main.bundle.js", CachedResponse::ok("bundle")),
    ));

    spawn_sw_message_task(Arc::clone(&checker), worker.subscribe());

    let (worker_tx, worker_inbox) = mpsc::channel(16);
    let message_loop = Arc::clone(&worker);
    tokio::spawn(async move { message_loop.run(worker_inbox).await });

    // The coordinator arms itself as soon as an update becomes available
    let coordinator = UpdateCoordinator::new(Arc::clone(&state), executor);
    coordinator.spawn_reset_task();
    spawn_arming_task(coordinator.clone(), Arc::clone(&state));
    spawn_countdown_logger(Arc::clone(&state));

    // The user interacts once, then walks away
    state.activity.record();

    worker.install().await;
    worker.activate().await;

    // Exercise the request/reply side of the protocol
    let (envelope, reply) = Envelope::request(WorkerMessage::VersionCheck);
    if worker_tx.send(envelope).await.is_err() {
        warn!("Worker inbox closed before the version check was sent");
    } else if let Ok(WorkerMessage::VersionInfo { version, build, .. }) = reply.await {
        info!("Worker reports version {} (build {})", version, build);
    }

    tokio::select! {
        _ = session_finished(Arc::clone(&state)) => {
            info!("Update applied, session would reload here");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Demo session complete");
    Ok(())
}

/// Call `start_auto_update_process` once the update becomes available,
/// the way a notification surface would on render
fn spawn_arming_task<C, W, N>(
    coordinator: UpdateCoordinator<C, W, N>,
    state: Arc<SessionState>,
) where
    C: versynch::CacheManager + 'static,
    W: versynch::WorkerRegistry + 'static,
    N: versynch::Navigator + 'static,
{
    tokio::spawn(async move {
        let mut availability = state.subscribe_availability();
        loop {
            if *availability.borrow_and_update() {
                coordinator.start_auto_update_process().await;
                break;
            }
            if availability.changed().await.is_err() {
                warn!("Availability channel closed before an update arrived");
                break;
            }
        }
    });
}

/// Log countdown progress the way a notification banner would render it
fn spawn_countdown_logger(state: Arc<SessionState>) {
    tokio::spawn(async move {
        let mut countdown = state.subscribe_countdown();
        while countdown.changed().await.is_ok() {
            let current = countdown.borrow().clone();
            if current.is_update_in_progress {
                info!("Applying update now");
            } else if current.is_postponed {
                info!("Update postponed ({} so far)", current.postpone_count);
            } else {
                info!("Updating in {}s", current.remaining_seconds);
            }
        }
    });
}

/// Resolves once an update has been applied
async fn session_finished(state: Arc<SessionState>) {
    let mut countdown = state.subscribe_countdown();
    loop {
        if countdown.borrow_and_update().is_update_in_progress {
            return;
        }
        if countdown.changed().await.is_err() {
            return;
        }
    }
}
