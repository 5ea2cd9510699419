//! Guild settings access
//!
//! One row per guild in `guild_settings`. Rows are created on first write;
//! column defaults cover settings never written.

use crate::error::{Error, Result};
use crate::store::{GuildSettings, SettingUpdate};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

type SettingsRow = (i64, i64, String, Option<String>, Option<String>);

/// Load settings, `None` if the guild has no row yet
pub async fn get_settings(db: &Pool<Sqlite>, guild_id: &str) -> Result<Option<GuildSettings>> {
    let row: Option<SettingsRow> = sqlx::query_as(
        r#"
        SELECT volume, shuffle_mode, eq_mode, voice_channel_id, text_channel_id
        FROM guild_settings
        WHERE guild_id = ?
        "#,
    )
    .bind(guild_id)
    .fetch_optional(db)
    .await?;

    let Some((volume, shuffle_mode, eq_mode, voice_channel_id, text_channel_id)) = row else {
        return Ok(None);
    };

    Ok(Some(GuildSettings {
        volume: volume.clamp(0, u8::MAX as i64) as u8,
        shuffle_mode: shuffle_mode != 0,
        eq_mode: crate::playback::equalizer::EqualizerMode::from_str(&eq_mode)
            .map_err(Error::Config)?,
        voice_channel_id,
        text_channel_id,
    }))
}

/// Write one setting, creating the guild row if needed
pub async fn update_setting(db: &Pool<Sqlite>, guild_id: &str, update: &SettingUpdate) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("INSERT INTO guild_settings (guild_id) VALUES (?) ON CONFLICT(guild_id) DO NOTHING")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;

    // key() is always one of the fixed column names
    let sql = format!(
        "UPDATE guild_settings SET {} = ?, updated_at = CURRENT_TIMESTAMP WHERE guild_id = ?",
        update.key()
    );
    let query = sqlx::query(&sql);
    let query = match update {
        SettingUpdate::Volume(v) => query.bind(*v as i64),
        SettingUpdate::ShuffleMode(s) => query.bind(*s as i64),
        SettingUpdate::EqMode(m) => query.bind(m.as_str()),
        SettingUpdate::VoiceChannel(c) | SettingUpdate::TextChannel(c) => query.bind(c.clone()),
    };
    query.bind(guild_id).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(())
}
