//! Rule Cache - per-URL published rule sets
//!
//! Holds at most one snapshot per URL. Publishing swaps the whole `Arc`, so
//! readers see either the previous snapshot or the new one, never a mix.
//!
//! # Thread Safety
//! Uses `DashMap` for per-bucket locking. The matcher clones the `Arc`s out
//! and releases the shard locks before evaluating any rule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::types::{RuleSetSnapshot, SnapshotRef};

pub struct RuleCache {
    snapshots: DashMap<String, SnapshotRef>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    /// Replace the snapshot for its URL in one step
    pub fn publish(&self, snapshot: RuleSetSnapshot) -> SnapshotRef {
        let snapshot = Arc::new(snapshot);
        let previous = self
            .snapshots
            .insert(snapshot.url.clone(), Arc::clone(&snapshot));
        debug!(
            "RuleCache: published {} rules for {} (previous: {})",
            snapshot.len(),
            snapshot.url,
            previous.map(|p| p.len().to_string()).unwrap_or_else(|| "none".to_string())
        );
        snapshot
    }

    #[inline]
    pub fn get(&self, url: &str) -> Option<SnapshotRef> {
        self.snapshots.get(url).map(|r| Arc::clone(r.value()))
    }

    /// Drop the snapshot for a URL
    pub fn evict(&self, url: &str) -> Option<SnapshotRef> {
        let removed = self.snapshots.remove(url).map(|(_, snapshot)| snapshot);
        if removed.is_some() {
            debug!("RuleCache: evicted {}", url);
        }
        removed
    }

    /// All current snapshots, ordered by URL
    pub fn snapshots(&self) -> Vec<SnapshotRef> {
        let mut all: Vec<SnapshotRef> = self
            .snapshots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        all.sort_by(|a, b| a.url.cmp(&b.url));
        all
    }

    /// Whether a URL needs a refresh at `now`: no snapshot yet, or older than `interval`
    pub fn is_stale(&self, url: &str, interval: Duration, now: Instant) -> bool {
        match self.snapshots.get(url) {
            Some(entry) => entry.value().age_at(now) > interval,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}
