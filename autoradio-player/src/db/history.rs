//! Play history and statistics
//!
//! History timestamps are epoch milliseconds so window checks compare
//! integers. Each recorded play also bumps the guild's daily counter in
//! `play_stats`.

use crate::error::Result;
use crate::track::Track;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;

const HOUR_MS: i64 = 60 * 60 * 1000;

fn window_start_ms(now_ms: i64, window_hours: u32) -> i64 {
    now_ms - window_hours as i64 * HOUR_MS
}

/// Append a history record and increment today's counter
pub async fn record_play(db: &Pool<Sqlite>, guild_id: &str, track: &Track, now_ms: i64) -> Result<()> {
    let mut tx = db.begin().await?;

    let requested_by = if track.requested_by.is_empty() {
        "Auto"
    } else {
        track.requested_by.as_str()
    };

    sqlx::query(
        r#"
        INSERT INTO play_history (guild_id, source_id, source_url, title, artist, requested_by, played_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(guild_id)
    .bind(track.source_id().unwrap_or(""))
    .bind(track.source_url().unwrap_or(""))
    .bind(&track.title)
    .bind(&track.artist)
    .bind(requested_by)
    .bind(now_ms)
    .execute(&mut *tx)
    .await?;

    let day = chrono::DateTime::from_timestamp_millis(now_ms)
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%d")
        .to_string();

    sqlx::query(
        r#"
        INSERT INTO play_stats (guild_id, day, songs_played) VALUES (?, ?, 1)
        ON CONFLICT(guild_id, day) DO UPDATE SET songs_played = songs_played + 1
        "#,
    )
    .bind(guild_id)
    .bind(day)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn is_recently_played(
    db: &Pool<Sqlite>,
    guild_id: &str,
    source_id: &str,
    window_hours: u32,
    now_ms: i64,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM play_history
            WHERE guild_id = ? AND source_id = ? AND played_at_ms > ?
        )
        "#,
    )
    .bind(guild_id)
    .bind(source_id)
    .bind(window_start_ms(now_ms, window_hours))
    .fetch_one(db)
    .await?;
    Ok(exists)
}

/// Distinct source ids played inside the window
pub async fn recently_played(
    db: &Pool<Sqlite>,
    guild_id: &str,
    window_hours: u32,
    now_ms: i64,
) -> Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT source_id FROM play_history
        WHERE guild_id = ? AND played_at_ms > ? AND source_id != ''
        "#,
    )
    .bind(guild_id)
    .bind(window_start_ms(now_ms, window_hours))
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Total plays across all days
pub async fn play_count(db: &Pool<Sqlite>, guild_id: &str) -> Result<u64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(songs_played), 0) FROM play_stats WHERE guild_id = ?",
    )
    .bind(guild_id)
    .fetch_one(db)
    .await?;
    Ok(total.max(0) as u64)
}
