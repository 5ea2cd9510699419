//! Database access layer
//!
//! SQLite implementation of the session store, split by table:
//! - `init`: schema creation
//! - `settings`: per-guild settings
//! - `history`: play history and daily statistics
//! - `catalog`: last fetched catalog
//! - `favorites`: per-user saved tracks

pub mod catalog;
pub mod favorites;
pub mod history;
pub mod init;
pub mod settings;

use crate::catalog::CatalogEntry;
use crate::error::Result;
use crate::store::{Favorite, GuildSettings, SessionStore, SettingUpdate};
use crate::track::Track;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Session store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and ensure the schema
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!("Connected to database: {}", path.display());
        Self::from_pool(pool).await
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        init::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get_settings(&self, guild_id: &str) -> Result<Option<GuildSettings>> {
        settings::get_settings(&self.pool, guild_id).await
    }

    async fn update_setting(&self, guild_id: &str, update: SettingUpdate) -> Result<()> {
        settings::update_setting(&self.pool, guild_id, &update).await
    }

    async fn is_recently_played(
        &self,
        guild_id: &str,
        source_id: &str,
        window_hours: u32,
    ) -> Result<bool> {
        history::is_recently_played(&self.pool, guild_id, source_id, window_hours, now_ms()).await
    }

    async fn recently_played(&self, guild_id: &str, window_hours: u32) -> Result<HashSet<String>> {
        history::recently_played(&self.pool, guild_id, window_hours, now_ms()).await
    }

    async fn record_play(&self, guild_id: &str, track: &Track) -> Result<()> {
        history::record_play(&self.pool, guild_id, track, now_ms()).await
    }

    async fn play_count(&self, guild_id: &str) -> Result<u64> {
        history::play_count(&self.pool, guild_id).await
    }

    async fn save_catalog(&self, entries: &[CatalogEntry], source: &str) -> Result<()> {
        catalog::save_catalog(&self.pool, entries, source, now_ms()).await
    }

    async fn latest_catalog(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
        catalog::latest_catalog(&self.pool, limit).await
    }

    async fn add_favorite(&self, user_id: &str, favorite: &Favorite) -> Result<bool> {
        favorites::add_favorite(&self.pool, user_id, favorite).await
    }

    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>> {
        favorites::favorites(&self.pool, user_id).await
    }

    async fn remove_favorite(&self, user_id: &str, source_id: &str) -> Result<bool> {
        favorites::remove_favorite(&self.pool, user_id, source_id).await
    }
}
