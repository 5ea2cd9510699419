//! Per-user favorites
//!
//! Saving reads the current track; playing queues every favorite as a
//! shuffled batch behind manual requests, then starts playback if idle.

use super::core::PlaybackEngine;
use crate::error::{Error, Result};
use crate::store::Favorite;
use crate::track::Track;
use autoradio_common::events::TrackInfo;
use std::sync::Arc;
use tracing::info;

impl PlaybackEngine {
    /// Save the current track to `user_id`'s favorites.
    ///
    /// Returns the track and whether it was newly added.
    pub async fn add_favorite(&self, user_id: &str) -> Result<(TrackInfo, bool)> {
        let track = self
            .queue
            .read()
            .await
            .current()
            .cloned()
            .ok_or_else(|| Error::NotFound("no track is playing".to_string()))?;
        let favorite = Favorite::from_track(&track, chrono::Utc::now().timestamp_millis())
            .ok_or_else(|| {
                Error::InvalidState(format!("'{}' has no source yet", track.title))
            })?;

        let added = self.deps.store.add_favorite(user_id, &favorite).await?;
        info!(user = user_id, title = %track.title, added, "Favorite saved");
        Ok((track.to_info(), added))
    }

    pub async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>> {
        self.deps.store.favorites(user_id).await
    }

    /// Remove the favorite at `index` (0-based, newest first)
    pub async fn remove_favorite(&self, user_id: &str, index: usize) -> Result<Favorite> {
        let mut favorites = self.deps.store.favorites(user_id).await?;
        if index >= favorites.len() {
            return Err(Error::NotFound(format!(
                "no favorite at position {}, {} saved",
                index + 1,
                favorites.len()
            )));
        }
        let favorite = favorites.swap_remove(index);
        if !self
            .deps
            .store
            .remove_favorite(user_id, &favorite.source_id)
            .await?
        {
            return Err(Error::NotFound(format!(
                "'{}' is no longer a favorite",
                favorite.title
            )));
        }
        info!(user = user_id, title = %favorite.title, "Favorite removed");
        Ok(favorite)
    }

    /// Queue all of `user_id`'s favorites, shuffled. Returns how many.
    pub async fn play_favorites(self: &Arc<Self>, user_id: &str) -> Result<usize> {
        let tracks: Vec<Track> = self
            .deps
            .store
            .favorites(user_id)
            .await?
            .iter()
            .map(|f| f.to_track(user_id))
            .collect();
        if tracks.is_empty() {
            return Err(Error::NotFound("no favorites saved".to_string()));
        }

        let count = tracks.len();
        self.queue.write().await.enqueue_batch(tracks, true);
        info!(user = user_id, "Queued {} favorites", count);
        self.emit_queue_changed().await;

        self.play_if_idle().await;
        Ok(count)
    }
}
