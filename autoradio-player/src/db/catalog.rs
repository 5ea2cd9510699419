//! Persisted catalog
//!
//! Holds the last fetched catalog so a restart can warm the cache before
//! the first refresh finishes.

use crate::catalog::CatalogEntry;
use crate::error::Result;
use crate::track::ResolvedSource;
use sqlx::{Pool, Sqlite};
use tracing::info;

type CatalogRow = (
    String,
    String,
    Option<String>,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
);

/// Replace the persisted catalog with `entries`
pub async fn save_catalog(
    db: &Pool<Sqlite>,
    entries: &[CatalogEntry],
    source: &str,
    now_ms: i64,
) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM catalog_tracks")
        .execute(&mut *tx)
        .await?;

    for entry in entries {
        let resolved = entry.source.as_ref();
        sqlx::query(
            r#"
            INSERT INTO catalog_tracks
                (title, artist, genre, rank, source_url, source_id, thumbnail_url,
                 duration_secs, catalog_source, fetched_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.title)
        .bind(&entry.artist)
        .bind(entry.genre.as_deref())
        .bind(entry.rank as i64)
        .bind(resolved.map(|s| s.url.as_str()))
        .bind(resolved.map(|s| s.source_id.as_str()))
        .bind(resolved.and_then(|s| s.thumbnail_url.as_deref()))
        .bind(resolved.map(|s| s.duration_secs as i64).unwrap_or(0))
        .bind(source)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!("Saved {} catalog entries from {}", entries.len(), source);
    Ok(())
}

/// Persisted catalog in rank order
pub async fn latest_catalog(db: &Pool<Sqlite>, limit: usize) -> Result<Vec<CatalogEntry>> {
    let rows: Vec<CatalogRow> = sqlx::query_as(
        r#"
        SELECT title, artist, genre, rank, source_url, source_id, thumbnail_url, duration_secs
        FROM catalog_tracks
        ORDER BY rank ASC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(title, artist, genre, rank, source_url, source_id, thumbnail_url, duration_secs)| {
                let source = match (source_url, source_id) {
                    (Some(url), Some(source_id)) if !url.is_empty() && !source_id.is_empty() => {
                        Some(ResolvedSource {
                            url,
                            source_id,
                            thumbnail_url: thumbnail_url.filter(|t| !t.is_empty()),
                            duration_secs: duration_secs.max(0) as u64,
                            title: None,
                            uploader: None,
                        })
                    }
                    _ => None,
                };
                CatalogEntry {
                    title,
                    artist,
                    genre,
                    rank: rank.max(0) as u32,
                    source,
                }
            },
        )
        .collect())
}
