//! Rotating content catalog
//!
//! - `cache`: last fetched candidate list plus its fetch time
//! - `fallback`: fixed 50-entry list used when every source comes back empty
//! - `search`: yt-dlp search source
//! - `refresher`: periodic fetch, enrich, persist, replace

mod cache;
mod fallback;
mod refresher;
mod search;

pub use cache::CatalogCache;
pub use fallback::{fallback_entries, FALLBACK_LEN};
pub use refresher::{CatalogRefresher, RefreshSettings};
pub use search::YtDlpSearchCatalog;

use crate::error::Result;
use crate::track::{ResolvedSource, Track};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A candidate track as produced by a catalog source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    /// Position in the catalog, 1-based
    pub rank: u32,
    pub source: Option<ResolvedSource>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, rank: u32) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            genre: None,
            rank,
            source: None,
        }
    }

    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist)
    }

    pub fn is_resolved(&self) -> bool {
        self.source.is_some()
    }

    /// Convert to an auto-fill queue track
    pub fn to_track(&self) -> Track {
        let mut track = Track::new(self.title.clone(), self.artist.clone())
            .with_rank(self.rank)
            .with_requested_by("catalog");
        if let Some(genre) = &self.genre {
            track = track.with_genre(genre.clone());
        }
        if let Some(source) = &self.source {
            track = track.with_source(source.clone());
        }
        track
    }
}

/// Produces candidate tracks
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Short name recorded with persisted catalogs
    fn name(&self) -> &str;

    /// Fetch candidates in rank order; may be empty
    async fn fetch_candidates(&self) -> Result<Vec<CatalogEntry>>;
}
