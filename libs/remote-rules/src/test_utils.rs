//! Test helpers: an in-memory document fetcher with failure and delay controls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::{RemoteInfoError, Result};
use crate::fetcher::DocumentFetcher;

/// Blocks fetches of one URL until released
#[derive(Debug, Default)]
pub struct FetchGate {
    open: AtomicBool,
    notify: Notify,
}

impl FetchGate {
    pub fn release(&self) {
        self.open.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Document {
    body: Option<String>,
    failing: bool,
    gate: Option<Arc<FetchGate>>,
}

/// Serves documents from memory
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: DashMap<String, Document>,
    fetches: DashMap<String, usize>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url` and clear any failure
    pub fn set_document(&self, url: &str, body: &str) {
        let mut doc = self.documents.entry(url.to_string()).or_default();
        doc.body = Some(body.to_string());
        doc.failing = false;
    }

    /// Make fetches of `url` fail
    pub fn fail(&self, url: &str) {
        self.documents.entry(url.to_string()).or_default().failing = true;
    }

    /// Hold fetches of `url` until the returned gate is released
    pub fn hold(&self, url: &str) -> Arc<FetchGate> {
        let gate = Arc::new(FetchGate::default());
        self.documents.entry(url.to_string()).or_default().gate = Some(Arc::clone(&gate));
        gate
    }

    /// Number of fetches started for `url`
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.get(url).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        *self.fetches.entry(url.to_string()).or_insert(0) += 1;

        let gate = self.documents.get(url).and_then(|d| d.gate.clone());
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let doc = self
            .documents
            .get(url)
            .map(|d| d.value().clone())
            .unwrap_or_default();

        match doc.body {
            Some(body) if !doc.failing => Ok(body),
            _ => Err(RemoteInfoError::Fetch {
                url: url.to_string(),
                reason: "simulated fetch failure".to_string(),
            }),
        }
    }
}
