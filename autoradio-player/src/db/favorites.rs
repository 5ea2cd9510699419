//! Per-user favorites
//!
//! One row per (user, source id); saving the same source twice is a no-op.

use crate::error::Result;
use crate::store::Favorite;
use sqlx::{Pool, Sqlite};

type FavoriteRow = (String, String, String, String, i64, i64);

/// Insert unless the user already saved this source. Returns true if added.
pub async fn add_favorite(db: &Pool<Sqlite>, user_id: &str, favorite: &Favorite) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO user_favorites
            (user_id, title, artist, source_url, source_id, duration_secs, added_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(&favorite.title)
    .bind(&favorite.artist)
    .bind(&favorite.source_url)
    .bind(&favorite.source_id)
    .bind(favorite.duration_secs as i64)
    .bind(favorite.added_at_ms)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Newest first; insertion order breaks timestamp ties
pub async fn favorites(db: &Pool<Sqlite>, user_id: &str) -> Result<Vec<Favorite>> {
    let rows: Vec<FavoriteRow> = sqlx::query_as(
        r#"
        SELECT title, artist, source_url, source_id, duration_secs, added_at_ms
        FROM user_favorites
        WHERE user_id = ?
        ORDER BY added_at_ms DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(title, artist, source_url, source_id, duration_secs, added_at_ms)| Favorite {
                title,
                artist,
                source_url,
                source_id,
                duration_secs: duration_secs.max(0) as u64,
                added_at_ms,
            },
        )
        .collect())
}

pub async fn remove_favorite(db: &Pool<Sqlite>, user_id: &str, source_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = ? AND source_id = ?")
        .bind(user_id)
        .bind(source_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init::create_schema(&pool).await.unwrap();
        pool
    }

    fn favorite(source_id: &str, added_at_ms: i64) -> Favorite {
        Favorite {
            title: format!("title-{}", source_id),
            artist: "Artist".to_string(),
            source_url: format!("https://example.com/{}", source_id),
            source_id: source_id.to_string(),
            duration_secs: 90,
            added_at_ms,
        }
    }

    #[tokio::test]
    async fn test_duplicate_source_is_ignored() {
        let db = setup_test_db().await;

        assert!(add_favorite(&db, "u1", &favorite("a", 1)).await.unwrap());
        assert!(!add_favorite(&db, "u1", &favorite("a", 2)).await.unwrap());
        // Same source for another user is independent
        assert!(add_favorite(&db, "u2", &favorite("a", 3)).await.unwrap());

        assert_eq!(favorites(&db, "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listed_newest_first() {
        let db = setup_test_db().await;
        add_favorite(&db, "u1", &favorite("old", 10)).await.unwrap();
        add_favorite(&db, "u1", &favorite("new", 20)).await.unwrap();
        add_favorite(&db, "u1", &favorite("tie", 20)).await.unwrap();

        let ids: Vec<String> = favorites(&db, "u1")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.source_id)
            .collect();
        assert_eq!(ids, vec!["tie", "new", "old"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let db = setup_test_db().await;
        add_favorite(&db, "u1", &favorite("a", 1)).await.unwrap();

        assert!(!remove_favorite(&db, "u2", "a").await.unwrap());
        assert!(remove_favorite(&db, "u1", "a").await.unwrap());
        assert!(!remove_favorite(&db, "u1", "a").await.unwrap());
        assert!(favorites(&db, "u1").await.unwrap().is_empty());
    }
}
