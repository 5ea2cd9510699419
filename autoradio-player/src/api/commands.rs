//! Command table
//!
//! Built once at startup by [`CommandTableBuilder`] and immutable afterwards.
//! Each command name maps to a plain function pointer that receives the
//! shared [`CommandContext`] and the request arguments, and returns a JSON
//! value for the front-end to render.

use crate::catalog::CatalogRefresher;
use crate::error::{Error, Result};
use crate::playback::engine::PlaybackEngine;
use crate::playback::equalizer::EqualizerMode;
use autoradio_common::human_time::{format_progress_time, progress_bar};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const PROGRESS_BAR_LENGTH: usize = 20;
const DEFAULT_QUEUE_LIMIT: usize = 10;

/// Arguments accepted by commands; each command reads the fields it needs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandArgs {
    /// Search text for `play`
    pub query: Option<String>,
    /// Who issued the command
    pub requested_by: Option<String>,
    /// Volume percent for `volume`
    pub value: Option<i64>,
    /// Preset name for `equalizer`
    pub mode: Option<String>,
    /// 1-based queue position for `remove`
    pub position: Option<usize>,
    /// Entries to list for `queue`
    pub limit: Option<usize>,
    /// Voice channel for `join`
    pub channel_id: Option<String>,
    /// Subcommand for `favorite`: add, list, play or remove
    pub action: Option<String>,
}

/// What a handler can reach
#[derive(Clone)]
pub struct CommandContext {
    pub engine: Arc<PlaybackEngine>,
    pub refresher: Option<Arc<CatalogRefresher>>,
    help: Arc<Vec<CommandInfo>>,
}

impl CommandContext {
    pub fn new(
        engine: Arc<PlaybackEngine>,
        refresher: Option<Arc<CatalogRefresher>>,
        table: &CommandTable,
    ) -> Self {
        Self {
            engine,
            refresher,
            help: Arc::new(table.list()),
        }
    }
}

pub type CommandFuture = BoxFuture<'static, Result<Value>>;
pub type CommandHandler = fn(CommandContext, CommandArgs) -> CommandFuture;

/// Name and description, as listed by `help`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
}

struct CommandEntry {
    description: &'static str,
    handler: CommandHandler,
}

#[derive(Default)]
pub struct CommandTableBuilder {
    entries: Vec<(&'static str, CommandEntry)>,
}

impl CommandTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: &'static str,
        description: &'static str,
        handler: CommandHandler,
    ) -> Self {
        self.entries.push((name, CommandEntry { description, handler }));
        self
    }

    /// Freeze the table. Fails on an empty or duplicate name.
    pub fn build(self) -> Result<CommandTable> {
        let mut commands = BTreeMap::new();
        for (name, entry) in self.entries {
            if name.is_empty() {
                return Err(Error::Config("command name must not be empty".to_string()));
            }
            if commands.insert(name, entry).is_some() {
                return Err(Error::Config(format!("duplicate command '{}'", name)));
            }
        }
        Ok(CommandTable { commands })
    }
}

/// Immutable mapping from command name to handler
pub struct CommandTable {
    commands: BTreeMap<&'static str, CommandEntry>,
}

impl CommandTable {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Commands in name order
    pub fn list(&self) -> Vec<CommandInfo> {
        self.commands
            .iter()
            .map(|(name, entry)| CommandInfo {
                name: *name,
                description: entry.description,
            })
            .collect()
    }

    pub async fn dispatch(&self, name: &str, ctx: CommandContext, args: CommandArgs) -> Result<Value> {
        let entry = self
            .commands
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("unknown command '{}'", name)))?;
        debug!(command = name, "Dispatching command");
        (entry.handler)(ctx, args).await
    }
}

/// The player's command set
pub fn default_table() -> Result<CommandTable> {
    CommandTableBuilder::new()
        .register("play", "Search for a song and queue it ahead of auto-play", play)
        .register("pause", "Pause playback", pause)
        .register("resume", "Resume paused playback", resume)
        .register("skip", "Skip to the next track", skip)
        .register("previous", "Replay the previous track", previous)
        .register("stop", "Stop playback, clear the queue and leave voice", stop)
        .register("volume", "Show or set the volume (0-max percent)", volume)
        .register("equalizer", "Show or set the EQ preset", equalizer)
        .register("shuffle", "Toggle shuffle mode", shuffle)
        .register("queue", "List upcoming tracks", queue)
        .register("remove", "Remove a queued track by position", remove)
        .register("clear", "Clear upcoming tracks", clear)
        .register("nowplaying", "Show the current track and progress", now_playing)
        .register("join", "Join voice and start the radio", join)
        .register("refresh", "Refresh the catalog now", refresh)
        .register("playall", "Queue the whole catalog, shuffled", play_all)
        .register("stats", "Show play statistics", stats)
        .register("favorite", "Add, list, play or remove your favorites", favorite)
        .register("help", "List commands", help)
        .build()
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Internal(e.to_string()))
}

fn play(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        let query = args
            .query
            .ok_or_else(|| Error::BadRequest("play needs a query".to_string()))?;
        let requested_by = args.requested_by.unwrap_or_else(|| "api".to_string());
        let track = ctx.engine.request(&query, &requested_by).await?;
        to_value(track)
    }
    .boxed()
}

fn pause(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        ctx.engine.pause().await?;
        Ok(json!({ "state": ctx.engine.state().await }))
    }
    .boxed()
}

fn resume(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        ctx.engine.resume().await?;
        Ok(json!({ "state": ctx.engine.state().await }))
    }
    .boxed()
}

fn skip(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        ctx.engine.skip().await?;
        to_value(ctx.engine.snapshot().await)
    }
    .boxed()
}

fn previous(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        ctx.engine.previous().await?;
        to_value(ctx.engine.snapshot().await)
    }
    .boxed()
}

fn stop(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        ctx.engine.stop().await;
        Ok(json!({ "state": ctx.engine.state().await }))
    }
    .boxed()
}

fn volume(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        let volume = match args.value {
            Some(value) => {
                let requested = value.clamp(0, u32::MAX as i64) as u32;
                ctx.engine.set_volume(requested).await
            }
            None => ctx.engine.volume().await,
        };
        Ok(json!({
            "volume": volume,
            "max_volume": ctx.engine.config().max_volume,
        }))
    }
    .boxed()
}

fn equalizer(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        if let Some(mode) = args.mode {
            let mode = EqualizerMode::from_str(&mode).map_err(Error::BadRequest)?;
            ctx.engine.set_equalizer(mode).await?;
        }
        let modes: Vec<&str> = EqualizerMode::ALL.iter().map(|m| m.as_str()).collect();
        Ok(json!({
            "mode": ctx.engine.equalizer().await,
            "available": modes,
        }))
    }
    .boxed()
}

fn shuffle(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        let enabled = ctx.engine.toggle_shuffle().await;
        Ok(json!({ "shuffle": enabled }))
    }
    .boxed()
}

fn queue(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        let limit = args.limit.unwrap_or(DEFAULT_QUEUE_LIMIT);
        let view = ctx.engine.queue_view(limit).await;
        let length = ctx.engine.queue_len().await;
        let mut value = to_value(view)?;
        value["length"] = json!(length);
        Ok(value)
    }
    .boxed()
}

fn remove(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        let position = match args.position {
            Some(p) if p >= 1 => p,
            _ => return Err(Error::BadRequest("position must be 1 or greater".to_string())),
        };
        let removed = ctx.engine.remove(position - 1).await?;
        to_value(removed)
    }
    .boxed()
}

fn clear(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        let removed = ctx.engine.clear().await;
        Ok(json!({ "removed": removed }))
    }
    .boxed()
}

fn now_playing(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        let info = ctx.engine.snapshot().await;
        let progress = format_progress_time(info.elapsed_secs, info.duration_secs);
        let bar = progress_bar(info.elapsed_secs, info.duration_secs, PROGRESS_BAR_LENGTH);
        let mut value = to_value(info)?;
        value["progress"] = json!(progress);
        value["progress_bar"] = json!(bar);
        Ok(value)
    }
    .boxed()
}

fn join(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        if args.channel_id.is_some() {
            ctx.engine.set_voice_channel(args.channel_id).await;
        }
        ctx.engine.join_and_play().await?;
        to_value(ctx.engine.snapshot().await)
    }
    .boxed()
}

fn refresh(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        let refresher = ctx
            .refresher
            .ok_or_else(|| Error::InvalidState("catalog refresh is not configured".to_string()))?;
        let count = refresher.refresh().await?;
        Ok(json!({ "track_count": count }))
    }
    .boxed()
}

fn play_all(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move {
        let queued = ctx.engine.enqueue_catalog().await?;
        Ok(json!({ "queued": queued }))
    }
    .boxed()
}

fn favorite(ctx: CommandContext, args: CommandArgs) -> CommandFuture {
    async move {
        let user = args
            .requested_by
            .ok_or_else(|| Error::BadRequest("favorite needs requested_by".to_string()))?;
        match args.action.as_deref().unwrap_or("list") {
            "add" => {
                let (track, added) = ctx.engine.add_favorite(&user).await?;
                Ok(json!({ "track": track, "added": added }))
            }
            "list" => {
                let favorites = ctx.engine.favorites(&user).await?;
                Ok(json!({ "count": favorites.len(), "favorites": favorites }))
            }
            "play" => {
                let queued = ctx.engine.play_favorites(&user).await?;
                Ok(json!({ "queued": queued }))
            }
            "remove" => {
                let position = match args.position {
                    Some(p) if p >= 1 => p,
                    _ => return Err(Error::BadRequest("position must be 1 or greater".to_string())),
                };
                let removed = ctx.engine.remove_favorite(&user, position - 1).await?;
                to_value(removed)
            }
            other => Err(Error::BadRequest(format!(
                "unknown favorite action '{}', expected add, list, play or remove",
                other
            ))),
        }
    }
    .boxed()
}

fn stats(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move { to_value(ctx.engine.stats().await?) }.boxed()
}

fn help(ctx: CommandContext, _args: CommandArgs) -> CommandFuture {
    async move { to_value(ctx.help.as_ref()) }.boxed()
}
