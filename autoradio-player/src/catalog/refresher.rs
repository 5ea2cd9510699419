//! Periodic catalog refresh
//!
//! Sources are tried in order and the first non-empty result wins. When all
//! of them come back empty the static fallback list is used. Entries without
//! a source are resolved one by one (with a pause every few lookups), ranked
//! 1..n, persisted, and swapped into the cache.

use super::{fallback_entries, CatalogCache, CatalogEntry, CatalogSource};
use crate::error::Result;
use crate::resolver::SourceResolver;
use crate::store::SessionStore;
use autoradio_common::events::{EventBus, RadioEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub max_songs: usize,
    /// Pause after every N lookups (0 disables pausing)
    pub enrich_pause_every: usize,
    pub enrich_pause: Duration,
}

pub struct CatalogRefresher {
    sources: Vec<Arc<dyn CatalogSource>>,
    resolver: Arc<dyn SourceResolver>,
    cache: Arc<CatalogCache>,
    store: Arc<dyn SessionStore>,
    events: Arc<EventBus>,
    settings: RefreshSettings,
    /// Serialises scheduled and manual refreshes
    running: Mutex<()>,
}

impl CatalogRefresher {
    pub fn new(
        sources: Vec<Arc<dyn CatalogSource>>,
        resolver: Arc<dyn SourceResolver>,
        cache: Arc<CatalogCache>,
        store: Arc<dyn SessionStore>,
        events: Arc<EventBus>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            sources,
            resolver,
            cache,
            store,
            events,
            settings,
            running: Mutex::new(()),
        }
    }

    /// Load the persisted catalog into an empty cache
    pub async fn warm_start(&self) -> Result<usize> {
        let entries = self.store.latest_catalog(self.settings.max_songs).await?;
        let count = entries.len();
        if count > 0 {
            self.cache.warm(entries).await;
            info!("Catalog cache warmed with {} persisted entries", count);
        }
        Ok(count)
    }

    async fn fetch_first_non_empty(&self) -> (Vec<CatalogEntry>, String) {
        for source in &self.sources {
            match source.fetch_candidates().await {
                Ok(entries) if !entries.is_empty() => {
                    info!("Fetched {} catalog entries from {}", entries.len(), source.name());
                    return (entries, source.name().to_string());
                }
                Ok(_) => debug!("Catalog source {} returned nothing", source.name()),
                Err(e) => warn!("Catalog source {} failed: {}", source.name(), e),
            }
        }
        info!("All catalog sources empty, using fallback list");
        (fallback_entries(), "fallback".to_string())
    }

    /// Fetch, enrich, persist and cache. Returns the number of entries cached.
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.running.lock().await;

        let (mut entries, source_name) = self.fetch_first_non_empty().await;
        entries.truncate(self.settings.max_songs);

        let mut lookups = 0usize;
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
            if entry.is_resolved() {
                continue;
            }

            if lookups > 0
                && self.settings.enrich_pause_every > 0
                && lookups % self.settings.enrich_pause_every == 0
            {
                tokio::time::sleep(self.settings.enrich_pause).await;
            }
            lookups += 1;

            match self.resolver.resolve(&entry.search_query()).await {
                Ok(Some(source)) => entry.source = Some(source),
                Ok(None) => debug!(title = %entry.title, "No source found"),
                Err(e) => warn!(title = %entry.title, "Source lookup failed: {}", e),
            }
        }

        if entries.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.store.save_catalog(&entries, &source_name).await {
            error!("Failed to persist catalog: {}", e);
        }

        let count = entries.len();
        let resolved = entries.iter().filter(|e| e.is_resolved()).count();
        self.cache.replace(entries).await;
        info!(
            source = %source_name,
            "Catalog refreshed: {} entries, {} with sources", count, resolved
        );

        self.events.emit_lossy(RadioEvent::CatalogRefreshed {
            track_count: count,
            timestamp: chrono::Utc::now(),
        });
        Ok(count)
    }

    /// Refresh now and then every `interval` until cancelled
    pub fn spawn(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Catalog refresher stopping");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            error!("Catalog refresh failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}
