//! Track record
//!
//! A `Track` is immutable once enqueued, apart from its resolved source,
//! which is filled in at most once on first need (or early, by next-track
//! pre-resolution).

use autoradio_common::events::TrackInfo;
use serde::{Deserialize, Serialize};

/// Base URL used to rebuild a watch URL from a bare source id
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Playable source found by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// URL handed to the fetch stage of the decode pipeline
    pub url: String,
    /// Stable id of the source, used for recently-played suppression
    pub source_id: String,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u64,
    /// Title reported by the source, if any
    pub title: Option<String>,
    /// Uploader or channel reported by the source, if any
    pub uploader: Option<String>,
}

impl ResolvedSource {
    /// Build a source from a bare id, using the standard watch URL
    pub fn from_source_id(source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        Self {
            url: format!("{}{}", WATCH_URL_PREFIX, source_id),
            source_id,
            thumbnail_url: None,
            duration_secs: 0,
            title: None,
            uploader: None,
        }
    }
}

/// A queued unit of playable audio
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    /// Derived from source id and insertion time; assigned by the queue
    pub id: String,
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    /// Catalog position, 0 for manual requests
    pub rank: u32,
    pub is_manual_request: bool,
    pub requested_by: String,
    pub added_at_ms: i64,
    source: Option<ResolvedSource>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Track {
    /// Create an unresolved track
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            artist: artist.into(),
            genre: None,
            rank: 0,
            is_manual_request: false,
            requested_by: String::new(),
            added_at_ms: 0,
            source: None,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = requested_by.into();
        self
    }

    /// Create a track whose source is already known
    pub fn with_source(mut self, source: ResolvedSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Text query handed to the resolver
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist)
    }

    pub fn is_resolved(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&ResolvedSource> {
        self.source.as_ref()
    }

    /// Fill the lazy resolution fields.
    ///
    /// Returns `false` and leaves the track untouched if it was already
    /// resolved.
    pub fn resolve_with(&mut self, source: ResolvedSource) -> bool {
        if self.source.is_some() {
            return false;
        }
        self.source = Some(source);
        true
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.source_id.as_str())
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.url.as_str())
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.thumbnail_url.as_deref())
    }

    pub fn duration_secs(&self) -> u64 {
        self.source.as_ref().map(|s| s.duration_secs).unwrap_or(0)
    }

    /// Stamp queue-assigned fields: manual flag, insertion time and id
    pub(crate) fn stamp(&mut self, is_manual_request: bool, added_at_ms: i64) {
        self.is_manual_request = is_manual_request;
        self.added_at_ms = added_at_ms;
        self.id = format!("{}_{}", self.source_id().unwrap_or(""), added_at_ms);
    }

    /// Wire representation for events and API responses
    pub fn to_info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            source_url: self.source_url().map(str::to_string),
            thumbnail_url: self.thumbnail_url().map(str::to_string),
            duration_secs: self.duration_secs(),
            rank: self.rank,
            is_manual_request: self.is_manual_request,
            requested_by: self.requested_by.clone(),
        }
    }
}
