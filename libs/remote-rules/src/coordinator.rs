//! Refresh Coordinator - at most one in-flight refresh per URL
//!
//! Each URL owns a `RefreshToken`. A refresh request tries a non-blocking
//! acquire; if the token is held the request is dropped and reported as
//! already in progress. The next scheduler tick retries naturally.
//!
//! ```text
//! request_refresh ──▶ try_acquire ──▶ spawn ──▶ fetch ──▶ compile ──▶ publish
//!                         │                       │
//!                         ▼                       ▼
//!                  AlreadyInProgress        keep old snapshot
//! ```
//!
//! The guard returned by `try_acquire` releases the token when dropped, so
//! every exit path of the refresh task (success, fetch failure, panic, abort)
//! frees the URL. Removal takes the same token, which is why removing a
//! source during a refresh fails with `Busy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::RuleCache;
use crate::compiler::{compile_document, ExtractionPattern};
use crate::error::{RemoteInfoError, Result};
use crate::fetcher::DocumentFetcher;
use crate::store::SourceStore;
use crate::types::{RefreshOutcome, RuleSetSnapshot, SourceConfig};

// ============================================================================
// Refresh token
// ============================================================================

/// Per-URL exclusion token
struct RefreshToken {
    in_flight: AtomicBool,
    /// Set once the source is removed; a retired token never grants again
    retired: AtomicBool,
    /// Handle of the running refresh task, for shutdown
    task: Mutex<Option<JoinHandle<()>>>,
    released: Notify,
}

enum Acquire {
    Granted(RefreshGuard),
    Held,
    Retired,
}

impl RefreshToken {
    fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            task: Mutex::new(None),
            released: Notify::new(),
        }
    }

    fn try_acquire(self: &Arc<Self>) -> Acquire {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Acquire::Held;
        }

        if self.retired.load(Ordering::Acquire) {
            self.in_flight.store(false, Ordering::Release);
            return Acquire::Retired;
        }

        Acquire::Granted(RefreshGuard {
            token: Arc::clone(self),
        })
    }

    fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Holds a URL's token; releases it on drop
struct RefreshGuard {
    token: Arc<RefreshToken>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.token.in_flight.store(false, Ordering::Release);
        self.token.released.notify_waiters();
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs refreshes and serializes them per URL
pub struct RefreshCoordinator {
    store: Arc<dyn SourceStore>,
    cache: Arc<RuleCache>,
    fetcher: Arc<dyn DocumentFetcher>,
    tokens: DashMap<String, Arc<RefreshToken>>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn SourceStore>,
        cache: Arc<RuleCache>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            store,
            cache,
            fetcher,
            tokens: DashMap::new(),
        }
    }

    /// Current token for a URL, created on first use
    fn token(&self, url: &str) -> Arc<RefreshToken> {
        Arc::clone(
            self.tokens
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(RefreshToken::new()))
                .value(),
        )
    }

    fn acquire(&self, url: &str) -> Option<(Arc<RefreshToken>, RefreshGuard)> {
        loop {
            let token = self.token(url);
            match token.try_acquire() {
                Acquire::Granted(guard) => return Some((token, guard)),
                Acquire::Held => return None,
                Acquire::Retired => {
                    // Removal is replacing this token; pick up the fresh one
                    self.tokens
                        .remove_if(url, |_, current| Arc::ptr_eq(current, &token));
                },
            }
        }
    }

    /// Start a background refresh unless one is already running for the URL
    ///
    /// Never waits for the refresh itself.
    pub fn request_refresh(&self, config: &SourceConfig) -> RefreshOutcome {
        let Some((token, guard)) = self.acquire(&config.url) else {
            debug!("Refresh of {} already in progress, request dropped", config.url);
            return RefreshOutcome::AlreadyInProgress;
        };

        // Hold the slot across the spawn so a later refresh can't store its
        // handle before this one does
        let mut task = token.task.lock();
        *task = Some(tokio::spawn(run_refresh(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            Arc::clone(&self.fetcher),
            config.clone(),
            guard,
        )));

        RefreshOutcome::Started
    }

    /// Delete a source and its cached rules
    ///
    /// Fails with `Busy` while a refresh for the URL is running.
    pub async fn remove_source(&self, url: &str) -> Result<()> {
        if self.store.get(url).await?.is_none() {
            return Err(RemoteInfoError::NotFound(url.to_string()));
        }

        let Some((token, guard)) = self.acquire(url) else {
            return Err(RemoteInfoError::Busy(url.to_string()));
        };

        self.store.remove(url).await?;
        token.retired.store(true, Ordering::Release);
        self.cache.evict(url);
        self.tokens
            .remove_if(url, |_, current| Arc::ptr_eq(current, &token));
        drop(guard);

        info!("Removed source {}", url);
        Ok(())
    }

    /// Whether a refresh for the URL is running right now
    pub fn is_refreshing(&self, url: &str) -> bool {
        self.tokens
            .get(url)
            .map(|token| token.is_held())
            .unwrap_or(false)
    }

    /// Wait until no refresh for the URL is running
    pub async fn wait_for_refresh(&self, url: &str) {
        let Some(token) = self.tokens.get(url).map(|t| Arc::clone(t.value())) else {
            return;
        };

        loop {
            let released = token.released.notified();
            if !token.is_held() {
                return;
            }
            released.await;
        }
    }

    /// Abort every running refresh task (process shutdown)
    pub fn abort_in_flight(&self) -> usize {
        let mut aborted = 0;
        for entry in self.tokens.iter() {
            if let Some(handle) = entry.value().task.lock().take() {
                if !handle.is_finished() {
                    handle.abort();
                    aborted += 1;
                }
            }
        }
        if aborted > 0 {
            info!("Aborted {} in-flight refreshes", aborted);
        }
        aborted
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn SourceStore> {
        &self.store
    }
}

/// Body of one refresh task. `_guard` keeps the URL's token until return.
async fn run_refresh(
    store: Arc<dyn SourceStore>,
    cache: Arc<RuleCache>,
    fetcher: Arc<dyn DocumentFetcher>,
    config: SourceConfig,
    _guard: RefreshGuard,
) {
    let url = config.url.as_str();
    debug!("Refreshing {}", url);

    let body = match fetcher.fetch(url).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Refresh of {} failed, keeping previous rules: {}", url, e);
            return;
        },
    };

    let pattern = match ExtractionPattern::new(&config.pattern) {
        Ok(pattern) => pattern,
        Err(e) => {
            error!("Source {} has an unusable pattern: {}", url, e);
            return;
        },
    };

    let compiled = compile_document(&body, &pattern);

    // The source may have been removed or redeclared while downloading
    match store.get(url).await {
        Ok(Some(current)) if current == config => {},
        Ok(_) => {
            debug!("Source {} changed during refresh, discarding result", url);
            return;
        },
        Err(e) => {
            warn!("Refresh of {} could not confirm source: {}", url, e);
            return;
        },
    }

    let snapshot = cache.publish(RuleSetSnapshot::new(url, compiled.rules));
    info!(
        "Refreshed {}: {} rules ({} lines, {} invalid)",
        url,
        snapshot.len(),
        compiled.stats.lines,
        compiled.stats.invalid
    );
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::store::MemorySourceStore;
    use crate::test_utils::StaticFetcher;
    use crate::types::DEFAULT_EXTRACTION_PATTERN;
    use tracing_test::traced_test;

    const URL: &str = "http://rules.example/ping.txt";

    async fn setup(doc: &str) -> (RefreshCoordinator, Arc<StaticFetcher>, SourceConfig) {
        let store = Arc::new(MemorySourceStore::new());
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.set_document(URL, doc);

        let config = SourceConfig::new(URL, DEFAULT_EXTRACTION_PATTERN, 60);
        store.put(&config).await.unwrap();

        let coordinator =
            RefreshCoordinator::new(store, Arc::new(RuleCache::new()), fetcher.clone());
        (coordinator, fetcher, config)
    }

    #[test]
    fn test_token_guard_releases() {
        let token = Arc::new(RefreshToken::new());
        let guard = match token.try_acquire() {
            Acquire::Granted(guard) => guard,
            _ => panic!("expected token to be free"),
        };
        assert!(matches!(token.try_acquire(), Acquire::Held));
        drop(guard);
        assert!(!token.is_held());

        token.retired.store(true, Ordering::Release);
        assert!(matches!(token.try_acquire(), Acquire::Retired));
        assert!(!token.is_held());
    }

    #[tokio::test]
    async fn test_refresh_publishes() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;

        assert_eq!(coordinator.request_refresh(&config), RefreshOutcome::Started);
        coordinator.wait_for_refresh(URL).await;

        let snapshot = coordinator.cache().get(URL).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(fetcher.fetch_count(URL), 1);
        assert!(!coordinator.is_refreshing(URL));
    }

    #[tokio::test]
    async fn test_second_request_dropped_while_in_flight() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        let gate = fetcher.hold(URL);

        assert_eq!(coordinator.request_refresh(&config), RefreshOutcome::Started);
        assert_eq!(
            coordinator.request_refresh(&config),
            RefreshOutcome::AlreadyInProgress
        );
        assert!(coordinator.is_refreshing(URL));

        gate.release();
        coordinator.wait_for_refresh(URL).await;
        assert_eq!(fetcher.fetch_count(URL), 1);
        assert_eq!(coordinator.request_refresh(&config), RefreshOutcome::Started);
        coordinator.wait_for_refresh(URL).await;
        assert_eq!(fetcher.fetch_count(URL), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_fetch_failure_keeps_previous_snapshot() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        coordinator.request_refresh(&config);
        coordinator.wait_for_refresh(URL).await;

        fetcher.fail(URL);
        coordinator.request_refresh(&config);
        coordinator.wait_for_refresh(URL).await;

        let snapshot = coordinator.cache().get(URL).unwrap();
        assert_eq!(snapshot.rules[0].message(), "pong");
        assert!(logs_contain("keeping previous rules"));
    }

    #[tokio::test]
    async fn test_remove_busy_then_ok() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        let gate = fetcher.hold(URL);

        coordinator.request_refresh(&config);
        let err = coordinator.remove_source(URL).await.unwrap_err();
        assert!(matches!(err, RemoteInfoError::Busy(_)));

        gate.release();
        coordinator.wait_for_refresh(URL).await;
        assert!(coordinator.cache().get(URL).is_some());

        coordinator.remove_source(URL).await.unwrap();
        assert!(coordinator.cache().get(URL).is_none());
        assert!(coordinator.store().get(URL).await.unwrap().is_none());

        let err = coordinator.remove_source(URL).await.unwrap_err();
        assert!(matches!(err, RemoteInfoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_for_removed_source_is_discarded() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        coordinator.store().remove(URL).await.unwrap();

        coordinator.request_refresh(&config);
        coordinator.wait_for_refresh(URL).await;

        assert_eq!(fetcher.fetch_count(URL), 1);
        assert!(coordinator.cache().get(URL).is_none());
    }

    #[tokio::test]
    async fn test_refresh_for_redeclared_source_is_discarded() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        let gate = fetcher.hold(URL);

        coordinator.request_refresh(&config);
        // Redeclared with another pattern behind the coordinator's back
        coordinator.store().remove(URL).await.unwrap();
        let redeclared = SourceConfig::new(URL, r"(?P<trigger>\w+)\s*:\s*(?P<message>.*)", 60);
        coordinator.store().put(&redeclared).await.unwrap();

        gate.release();
        coordinator.wait_for_refresh(URL).await;
        assert!(coordinator.cache().get(URL).is_none());

        coordinator.request_refresh(&redeclared);
        coordinator.wait_for_refresh(URL).await;
        assert!(coordinator.cache().get(URL).is_some());
    }

    #[tokio::test]
    async fn test_abort_targets_latest_refresh() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;

        for _ in 0..5 {
            assert_eq!(coordinator.request_refresh(&config), RefreshOutcome::Started);
            coordinator.wait_for_refresh(URL).await;
        }

        let _gate = fetcher.hold(URL);
        coordinator.request_refresh(&config);
        tokio::task::yield_now().await;
        assert_eq!(coordinator.abort_in_flight(), 1);
        coordinator.wait_for_refresh(URL).await;
        assert!(!coordinator.is_refreshing(URL));
    }

    #[tokio::test]
    async fn test_abort_in_flight_releases_token() {
        let (coordinator, fetcher, config) = setup("ping => pong").await;
        let _gate = fetcher.hold(URL);

        coordinator.request_refresh(&config);
        tokio::task::yield_now().await;
        assert_eq!(coordinator.abort_in_flight(), 1);

        coordinator.wait_for_refresh(URL).await;
        assert!(!coordinator.is_refreshing(URL));
        assert!(coordinator.cache().get(URL).is_none());
    }
}
