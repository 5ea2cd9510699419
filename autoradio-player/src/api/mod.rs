//! HTTP control surface
//!
//! Routes:
//! - `GET /health`
//! - `GET /status` - now-playing snapshot
//! - `GET /queue` - current and upcoming tracks
//! - `GET /commands` - command table listing
//! - `POST /commands/:name` - run a command with JSON arguments
//! - `GET /events` - SSE stream of radio events

pub mod commands;
pub mod handlers;
pub mod sse;

use crate::catalog::CatalogRefresher;
use crate::error::Result;
use crate::playback::engine::PlaybackEngine;
use axum::{
    routing::{get, post},
    Router,
};
use commands::{CommandContext, CommandTable};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<PlaybackEngine>,
    pub commands: Arc<CommandTable>,
    pub command_ctx: CommandContext,
    pub port: u16,
}

impl AppContext {
    /// Context with the default command table
    pub fn new(
        engine: Arc<PlaybackEngine>,
        refresher: Option<Arc<CatalogRefresher>>,
        port: u16,
    ) -> Result<Self> {
        let table = commands::default_table()?;
        let command_ctx = CommandContext::new(Arc::clone(&engine), refresher, &table);
        Ok(Self {
            engine,
            commands: Arc::new(table),
            command_ctx,
            port,
        })
    }
}

/// Build the router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/queue", get(handlers::queue))
        .route("/commands", get(handlers::list_commands))
        .route("/commands/:name", post(handlers::run_command))
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
