//! Source Scheduler - periodic staleness sweep
//!
//! On every tick, each declared source whose snapshot is missing or older
//! than its interval gets a refresh request. Requests for URLs that are
//! already refreshing are dropped by the coordinator, so a slow source is
//! simply retried on a later tick.
//!
//! The first tick fires immediately, which doubles as the startup reload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::cache::RuleCache;
use crate::coordinator::RefreshCoordinator;
use crate::error::Result;
use crate::store::SourceStore;

/// Default scheduler tick (30 seconds)
pub const DEFAULT_TICK_SECS: u64 = 30;

/// Source Scheduler - drives refreshes for stale sources
pub struct SourceScheduler {
    store: Arc<dyn SourceStore>,
    cache: Arc<RuleCache>,
    coordinator: Arc<RefreshCoordinator>,
    /// Shutdown signal
    shutdown: Arc<Notify>,
    /// Running state
    running: Arc<AtomicBool>,
    tick: Duration,
}

impl SourceScheduler {
    pub fn new(coordinator: Arc<RefreshCoordinator>, tick: Duration) -> Self {
        Self {
            store: Arc::clone(coordinator.store()),
            cache: Arc::clone(coordinator.cache()),
            coordinator,
            shutdown: Arc::new(Notify::new()),
            running: Arc::new(AtomicBool::new(false)),
            tick,
        }
    }

    /// Run the scheduler loop until `stop` is called
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Scheduler already running");
            return;
        }

        info!("Starting source scheduler with {}s tick", self.tick.as_secs());

        let mut tick_interval = interval(self.tick);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Scheduler tick error: {}", e);
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Release);
        info!("Source scheduler stopped");
    }

    /// Stop the scheduler
    pub fn stop(&self) {
        info!("Stopping source scheduler...");
        self.shutdown.notify_one();
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Single sweep at the current time; returns the number of refreshes started
    pub async fn tick(&self) -> Result<usize> {
        self.tick_at(Instant::now()).await
    }

    /// Single sweep as seen at `now`
    pub async fn tick_at(&self, now: Instant) -> Result<usize> {
        let sources = self.store.list().await?;
        let mut started = 0;

        for source in &sources {
            if !self.cache.is_stale(&source.url, source.interval(), now) {
                continue;
            }
            if self.coordinator.request_refresh(source).started() {
                started += 1;
            }
        }

        if started > 0 {
            debug!(
                "Scheduler tick: {} of {} sources refreshing",
                started,
                sources.len()
            );
        }
        Ok(started)
    }

    /// Get scheduler status
    pub async fn status(&self) -> SchedulerStatus {
        let sources = match self.store.list().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Scheduler status could not list sources: {}", e);
                Vec::new()
            },
        };
        let refreshing = sources
            .iter()
            .filter(|s| self.coordinator.is_refreshing(&s.url))
            .count();

        SchedulerStatus {
            running: self.is_running(),
            total_sources: sources.len(),
            cached_sources: self.cache.len(),
            refreshing,
            tick_interval_secs: self.tick.as_secs(),
        }
    }
}

/// Scheduler status information
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub total_sources: usize,
    pub cached_sources: usize,
    pub refreshing: usize,
    pub tick_interval_secs: u64,
}
