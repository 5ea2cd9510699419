//! Settings/History store boundary
//!
//! The engine reads per-guild settings, persists changes, checks and records
//! play history, keeps per-user favorites, and warms the catalog cache
//! through this trait. The production implementation is
//! [`crate::db::SqliteStore`].

use crate::catalog::CatalogEntry;
use crate::error::Result;
use crate::playback::equalizer::EqualizerMode;
use crate::track::{ResolvedSource, Track};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;

/// Per-guild runtime settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildSettings {
    pub volume: u8,
    pub shuffle_mode: bool,
    pub eq_mode: EqualizerMode,
    pub voice_channel_id: Option<String>,
    pub text_channel_id: Option<String>,
}

/// A track a user saved for later
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Favorite {
    pub title: String,
    pub artist: String,
    pub source_url: String,
    /// Unique per user
    pub source_id: String,
    pub duration_secs: u64,
    pub added_at_ms: i64,
}

impl Favorite {
    /// Favorite for a resolved track; `None` if the track has no source
    pub fn from_track(track: &Track, added_at_ms: i64) -> Option<Self> {
        let source = track.source()?;
        Some(Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            source_url: source.url.clone(),
            source_id: source.source_id.clone(),
            duration_secs: source.duration_secs,
            added_at_ms,
        })
    }

    /// Queueable track; a stored URL is reused, otherwise it is rebuilt
    /// from the source id
    pub fn to_track(&self, requested_by: &str) -> Track {
        let mut source = ResolvedSource::from_source_id(self.source_id.clone());
        if !self.source_url.is_empty() {
            source.url = self.source_url.clone();
        }
        source.duration_secs = self.duration_secs;
        Track::new(self.title.clone(), self.artist.clone())
            .with_requested_by(requested_by)
            .with_source(source)
    }
}

/// A single setting change
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    Volume(u8),
    ShuffleMode(bool),
    EqMode(EqualizerMode),
    VoiceChannel(Option<String>),
    TextChannel(Option<String>),
}

impl SettingUpdate {
    /// Column name in `guild_settings`
    pub fn key(&self) -> &'static str {
        match self {
            SettingUpdate::Volume(_) => "volume",
            SettingUpdate::ShuffleMode(_) => "shuffle_mode",
            SettingUpdate::EqMode(_) => "eq_mode",
            SettingUpdate::VoiceChannel(_) => "voice_channel_id",
            SettingUpdate::TextChannel(_) => "text_channel_id",
        }
    }

    /// Apply to an in-memory settings value
    pub fn apply(&self, settings: &mut GuildSettings) {
        match self {
            SettingUpdate::Volume(v) => settings.volume = *v,
            SettingUpdate::ShuffleMode(s) => settings.shuffle_mode = *s,
            SettingUpdate::EqMode(m) => settings.eq_mode = *m,
            SettingUpdate::VoiceChannel(c) => settings.voice_channel_id = c.clone(),
            SettingUpdate::TextChannel(c) => settings.text_channel_id = c.clone(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored settings, or `None` for a guild never seen before
    async fn get_settings(&self, guild_id: &str) -> Result<Option<GuildSettings>>;

    async fn update_setting(&self, guild_id: &str, update: SettingUpdate) -> Result<()>;

    async fn is_recently_played(
        &self,
        guild_id: &str,
        source_id: &str,
        window_hours: u32,
    ) -> Result<bool>;

    /// Source ids played inside the window
    async fn recently_played(&self, guild_id: &str, window_hours: u32) -> Result<HashSet<String>>;

    /// Append a history record and bump the daily play counter
    async fn record_play(&self, guild_id: &str, track: &Track) -> Result<()>;

    /// Total plays recorded for the guild
    async fn play_count(&self, guild_id: &str) -> Result<u64>;

    /// Replace the persisted catalog
    async fn save_catalog(&self, entries: &[CatalogEntry], source: &str) -> Result<()>;

    /// Most recently persisted catalog, in rank order
    async fn latest_catalog(&self, limit: usize) -> Result<Vec<CatalogEntry>>;

    /// Save a favorite. Returns false if the user already has this source.
    async fn add_favorite(&self, user_id: &str, favorite: &Favorite) -> Result<bool>;

    /// The user's favorites, newest first
    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>>;

    /// Returns false if the user had no favorite with this source id
    async fn remove_favorite(&self, user_id: &str, source_id: &str) -> Result<bool>;
}
