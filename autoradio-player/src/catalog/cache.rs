//! In-memory catalog cache
//!
//! Replaced wholesale on each successful fetch; read-only to the engine.

use super::CatalogEntry;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[derive(Default)]
struct CacheInner {
    entries: Vec<CatalogEntry>,
    last_fetch: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct CatalogCache {
    inner: RwLock<CacheInner>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached list after a successful fetch
    pub async fn replace(&self, entries: Vec<CatalogEntry>) {
        let mut inner = self.inner.write().await;
        inner.entries = entries;
        inner.last_fetch = Some(Utc::now());
    }

    /// Load a persisted list without marking it as freshly fetched
    pub async fn warm(&self, entries: Vec<CatalogEntry>) {
        let mut inner = self.inner.write().await;
        if inner.entries.is_empty() {
            inner.entries = entries;
        }
    }

    pub async fn snapshot(&self) -> Vec<CatalogEntry> {
        self.inner.read().await.entries.clone()
    }

    pub async fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_fetch
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
