//! Source Store - durable record of declared sources
//!
//! The store is the source of truth for which URLs exist. Everything in the
//! rule cache is derived from it and can be rebuilt by refreshing.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{RemoteInfoError, Result};
use crate::types::SourceConfig;

/// Persistence seam for source declarations
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Insert a new source. Fails with `DuplicateSource` if the URL exists.
    async fn put(&self, config: &SourceConfig) -> Result<()>;

    /// Delete a source. Fails with `NotFound` if the URL is absent.
    async fn remove(&self, url: &str) -> Result<()>;

    /// Look up one source
    async fn get(&self, url: &str) -> Result<Option<SourceConfig>>;

    /// All sources in declaration order
    async fn list(&self) -> Result<Vec<SourceConfig>>;
}

/// In-process store, used by tests and for ephemeral deployments
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    sources: RwLock<IndexMap<String, SourceConfig>>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn put(&self, config: &SourceConfig) -> Result<()> {
        let mut sources = self.sources.write();
        if sources.contains_key(&config.url) {
            return Err(RemoteInfoError::DuplicateSource(config.url.clone()));
        }
        sources.insert(config.url.clone(), config.clone());
        Ok(())
    }

    async fn remove(&self, url: &str) -> Result<()> {
        self.sources
            .write()
            .shift_remove(url)
            .map(|_| ())
            .ok_or_else(|| RemoteInfoError::NotFound(url.to_string()))
    }

    async fn get(&self, url: &str) -> Result<Option<SourceConfig>> {
        Ok(self.sources.read().get(url).cloned())
    }

    async fn list(&self) -> Result<Vec<SourceConfig>> {
        Ok(self.sources.read().values().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemorySourceStore::new();
        let a = SourceConfig::new("http://a.example/rules", "x", 60);
        let b = SourceConfig::new("http://b.example/rules", "y", 120);

        store.put(&b).await.unwrap();
        store.put(&a).await.unwrap();
        assert_eq!(store.len(), 2);

        // Declaration order is preserved
        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![b.clone(), a.clone()]);

        assert_eq!(store.get(&a.url).await.unwrap(), Some(a.clone()));

        store.remove(&b.url).await.unwrap();
        assert_eq!(store.get(&b.url).await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_memory_store_errors() {
        let store = MemorySourceStore::new();
        let config = SourceConfig::new("http://a.example/rules", "x", 60);
        store.put(&config).await.unwrap();

        let err = store.put(&config).await.unwrap_err();
        assert!(matches!(err, RemoteInfoError::DuplicateSource(_)));

        let err = store.remove("http://missing").await.unwrap_err();
        assert!(matches!(err, RemoteInfoError::NotFound(_)));
        assert!(!store.is_empty());
    }
}
