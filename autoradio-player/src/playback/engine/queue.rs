//! Queue operations
//!
//! **Responsibilities:**
//! - Manual requests (resolve query, priority enqueue, start if idle)
//! - Catalog refill of an empty queue, with static fallback
//! - Whole-catalog enqueue, remove, clear, shuffle toggle
//! - Queue change notifications

use super::core::PlaybackEngine;
use crate::catalog::fallback_entries;
use crate::error::{Error, Result};
use crate::store::SettingUpdate;
use crate::track::Track;
use autoradio_common::events::{RadioEvent, TrackInfo};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl PlaybackEngine {
    /// Resolve `query` and queue the result ahead of auto-filled tracks.
    ///
    /// Starts playback when the engine is idle or stopped and the transport
    /// is connected.
    pub async fn request(self: &Arc<Self>, query: &str, requested_by: &str) -> Result<TrackInfo> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::BadRequest("empty search query".to_string()));
        }

        let source = self
            .deps
            .resolver
            .resolve(query)
            .await?
            .ok_or_else(|| Error::Resolution(format!("no results for '{}'", query)))?;

        let title = source.title.clone().unwrap_or_else(|| query.to_string());
        let artist = source
            .uploader
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        let track = Track::new(title, artist)
            .with_requested_by(requested_by)
            .with_source(source);

        let info = {
            let mut queue = self.queue.write().await;
            let id = queue.enqueue(track, true);
            let info = queue
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.to_info())
                .ok_or_else(|| Error::Internal("enqueued track not found".to_string()))?;
            info
        };
        info!(title = %info.title, requested_by, "Track requested");
        self.emit_queue_changed().await;

        self.play_if_idle().await;
        Ok(info)
    }

    /// Queue a track as-is (non-priority unless `priority`)
    pub async fn enqueue(&self, track: Track, priority: bool) -> String {
        let id = self.queue.write().await.enqueue(track, priority);
        self.emit_queue_changed().await;
        id
    }

    /// Queue every cached catalog entry that has a source, shuffled
    pub async fn enqueue_catalog(self: &Arc<Self>) -> Result<usize> {
        let tracks: Vec<Track> = self
            .deps
            .catalog
            .snapshot()
            .await
            .iter()
            .filter(|e| e.is_resolved())
            .map(|e| e.to_track())
            .collect();
        if tracks.is_empty() {
            return Err(Error::NotFound("catalog has no playable tracks".to_string()));
        }

        let count = tracks.len();
        self.queue.write().await.enqueue_batch(tracks, true);
        info!("Queued {} catalog tracks", count);
        self.emit_queue_changed().await;

        self.play_if_idle().await;
        Ok(count)
    }

    /// Remove the upcoming track at `index` (0-based)
    pub async fn remove(&self, index: usize) -> Result<TrackInfo> {
        let removed = self.queue.write().await.remove(index);
        let track = removed.ok_or_else(|| {
            Error::NotFound(format!("no queued track at position {}", index + 1))
        })?;
        debug!(title = %track.title, "Removed from queue");
        self.emit_queue_changed().await;
        Ok(track.to_info())
    }

    /// Drop every upcoming track; the current track keeps playing
    pub async fn clear(&self) -> usize {
        let removed = {
            let mut queue = self.queue.write().await;
            let len = queue.len();
            queue.clear();
            len
        };
        info!("Cleared {} queued tracks", removed);
        self.emit_queue_changed().await;
        removed
    }

    /// Flip shuffle mode and persist it. Returns the new mode.
    pub async fn toggle_shuffle(&self) -> bool {
        let enabled = self.queue.write().await.toggle_shuffle();
        self.persist(SettingUpdate::ShuffleMode(enabled)).await;
        info!(enabled, "Shuffle toggled");
        self.emit(RadioEvent::ShuffleChanged {
            enabled,
            timestamp: chrono::Utc::now(),
        });
        enabled
    }

    /// Refill an empty queue from the catalog cache.
    ///
    /// With an empty cache the static fallback list is used, resolving at
    /// most `enrich_limit` entries. Only tracks with a source are queued.
    /// Returns how many tracks were added.
    pub(super) async fn refill(&self, token: &CancellationToken) -> Result<usize> {
        let cached = self.deps.catalog.snapshot().await;

        let tracks: Vec<Track> = if !cached.is_empty() {
            cached
                .iter()
                .filter(|e| e.is_resolved())
                .map(|e| e.to_track())
                .collect()
        } else {
            info!(
                "Catalog cache empty, enriching up to {} fallback tracks",
                self.config.enrich_limit
            );
            let mut tracks = Vec::new();
            for entry in fallback_entries().into_iter().take(self.config.enrich_limit) {
                let query = entry.search_query();
                let found = tokio::select! {
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    found = self.deps.resolver.resolve(&query) => found,
                };
                match found {
                    Ok(Some(source)) => tracks.push(entry.to_track().with_source(source)),
                    Ok(None) => debug!(title = %entry.title, "No source for fallback track"),
                    Err(e) => warn!(title = %entry.title, "Fallback lookup failed: {}", e),
                }
            }
            tracks
        };

        let count = tracks.len();
        if count > 0 {
            let mut queue = self.queue.write().await;
            let shuffle = queue.is_shuffled();
            queue.enqueue_batch(tracks, shuffle);
        }
        info!("Queue refilled with {} tracks", count);
        self.emit_queue_changed().await;
        Ok(count)
    }
}
