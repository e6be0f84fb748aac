//! Management facade
//!
//! `RemoteInfo` wires the store, cache, coordinator and matcher together and
//! exposes the operations a host application needs: declare, remove, reload
//! and list sources, and evaluate inbound messages.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::RuleCache;
use crate::compiler::ExtractionPattern;
use crate::coordinator::RefreshCoordinator;
use crate::error::{RemoteInfoError, Result};
use crate::fetcher::DocumentFetcher;
use crate::interval::{format_interval, validate_interval};
use crate::matcher::Matcher;
use crate::scheduler::SourceScheduler;
use crate::store::SourceStore;
use crate::types::{
    Evaluation, RefreshOutcome, SourceConfig, SourceSummary, DEFAULT_EXTRACTION_PATTERN,
    DEFAULT_INTERVAL_SECS,
};

/// Values used when `add_source` omits the pattern or interval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDefaults {
    pub pattern: String,
    pub interval_secs: u64,
}

impl Default for SourceDefaults {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_EXTRACTION_PATTERN.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

pub struct RemoteInfo {
    store: Arc<dyn SourceStore>,
    cache: Arc<RuleCache>,
    coordinator: Arc<RefreshCoordinator>,
    matcher: Matcher,
    defaults: SourceDefaults,
}

impl RemoteInfo {
    pub fn new(
        store: Arc<dyn SourceStore>,
        fetcher: Arc<dyn DocumentFetcher>,
        defaults: SourceDefaults,
    ) -> Self {
        let cache = Arc::new(RuleCache::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            fetcher,
        ));

        Self {
            store,
            matcher: Matcher::new(Arc::clone(&cache)),
            cache,
            coordinator,
            defaults,
        }
    }

    /// Declare a source and start its first refresh
    pub async fn add_source(
        &self,
        url: &str,
        pattern: Option<&str>,
        interval_secs: Option<u64>,
    ) -> Result<SourceConfig> {
        let interval_secs = validate_interval(interval_secs.unwrap_or(self.defaults.interval_secs))?;
        let pattern = ExtractionPattern::new(pattern.unwrap_or(&self.defaults.pattern))?;

        let config = SourceConfig::new(url, pattern.as_str(), interval_secs);
        self.store.put(&config).await?;
        info!(
            "Added source {} (every {})",
            config.url,
            format_interval(config.interval_secs)
        );

        self.coordinator.request_refresh(&config);
        Ok(config)
    }

    /// Forget a source and its cached rules. Fails with `Busy` mid-refresh.
    pub async fn remove_source(&self, url: &str) -> Result<()> {
        self.coordinator.remove_source(url).await
    }

    /// Request an out-of-cycle refresh
    pub async fn reload_source(&self, url: &str) -> Result<RefreshOutcome> {
        let config = self
            .store
            .get(url)
            .await?
            .ok_or_else(|| RemoteInfoError::NotFound(url.to_string()))?;

        Ok(self.coordinator.request_refresh(&config))
    }

    /// Request a refresh of every declared source; returns how many started
    pub async fn reload_all(&self) -> Result<usize> {
        let sources = self.store.list().await?;
        Ok(sources
            .iter()
            .filter(|config| self.coordinator.request_refresh(config).started())
            .count())
    }

    /// Declared sources with their cache state
    pub async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let sources = self.store.list().await?;

        Ok(sources
            .into_iter()
            .map(|config| {
                let snapshot = self.cache.get(&config.url);
                SourceSummary {
                    interval: format_interval(config.interval_secs),
                    refreshed_at: snapshot.as_ref().map(|s| s.refreshed_at_utc),
                    rule_count: snapshot.as_ref().map(|s| s.len()).unwrap_or(0),
                    refreshing: self.coordinator.is_refreshing(&config.url),
                    url: config.url,
                    interval_secs: config.interval_secs,
                    pattern: config.pattern,
                }
            })
            .collect())
    }

    /// Evaluate an inbound message against the cached rules
    pub fn evaluate(&self, text: &str, addressed: bool) -> Evaluation {
        self.matcher.evaluate(text, addressed)
    }

    /// Build a scheduler sweeping this instance's sources
    pub fn scheduler(&self, tick: Duration) -> SourceScheduler {
        SourceScheduler::new(Arc::clone(&self.coordinator), tick)
    }

    /// Wait until no refresh for `url` is running
    pub async fn wait_for_refresh(&self, url: &str) {
        self.coordinator.wait_for_refresh(url).await
    }

    /// Abort in-flight refreshes (process shutdown)
    pub fn shutdown(&self) -> usize {
        self.coordinator.abort_in_flight()
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }
}
