//! Database initialization
//!
//! Creates every table the player uses. Idempotent; runs at startup.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS guild_settings (
        guild_id TEXT PRIMARY KEY,
        volume INTEGER NOT NULL DEFAULT 50,
        shuffle_mode INTEGER NOT NULL DEFAULT 1,
        eq_mode TEXT NOT NULL DEFAULT 'normal',
        voice_channel_id TEXT,
        text_channel_id TEXT,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS play_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guild_id TEXT NOT NULL,
        source_id TEXT NOT NULL DEFAULT '',
        source_url TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL,
        artist TEXT NOT NULL DEFAULT 'Unknown',
        requested_by TEXT NOT NULL DEFAULT 'Auto',
        played_at_ms INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_guild_source ON play_history(guild_id, source_id, played_at_ms)",
    r#"
    CREATE TABLE IF NOT EXISTS catalog_tracks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        artist TEXT NOT NULL DEFAULT 'Unknown',
        genre TEXT,
        rank INTEGER NOT NULL DEFAULT 0,
        source_url TEXT,
        source_id TEXT,
        thumbnail_url TEXT,
        duration_secs INTEGER NOT NULL DEFAULT 0,
        catalog_source TEXT NOT NULL DEFAULT 'unknown',
        fetched_at_ms INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        artist TEXT NOT NULL DEFAULT 'Unknown',
        source_url TEXT NOT NULL DEFAULT '',
        source_id TEXT NOT NULL,
        duration_secs INTEGER NOT NULL DEFAULT 0,
        added_at_ms INTEGER NOT NULL,
        UNIQUE(user_id, source_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS play_stats (
        guild_id TEXT NOT NULL,
        day TEXT NOT NULL,
        songs_played INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (guild_id, day)
    )
    "#,
];

/// Create all tables and indexes if missing
pub async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
