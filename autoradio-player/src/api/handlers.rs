//! HTTP request handlers

use super::commands::{CommandArgs, CommandInfo};
use super::AppContext;
use crate::error::Error;
use crate::playback::engine::QueueView;
use autoradio_common::events::NowPlayingInfo;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

/// API error with an HTTP status
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::Resolution(_) => (StatusCode::NOT_FOUND, "NO_SOURCE"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Error::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, "TRANSPORT"),
            Error::QueueExhausted => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_EXHAUSTED"),
            Error::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
}

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    limit: Option<usize>,
}

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "autoradio-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

/// GET /status
pub async fn status(State(ctx): State<AppContext>) -> Json<NowPlayingInfo> {
    Json(ctx.engine.snapshot().await)
}

/// GET /queue?limit=N
pub async fn queue(
    State(ctx): State<AppContext>,
    Query(params): Query<QueueParams>,
) -> Json<QueueView> {
    Json(ctx.engine.queue_view(params.limit.unwrap_or(25)).await)
}

/// GET /commands
pub async fn list_commands(State(ctx): State<AppContext>) -> Json<Vec<CommandInfo>> {
    Json(ctx.commands.list())
}

/// POST /commands/:name
///
/// The body is optional; a missing or non-JSON body runs the command with
/// no arguments.
pub async fn run_command(
    State(ctx): State<AppContext>,
    Path(name): Path<String>,
    args: Option<Json<CommandArgs>>,
) -> ApiResult<Json<Value>> {
    let args = args.map(|Json(a)| a).unwrap_or_default();
    info!(command = %name, "Command received");
    let value = ctx
        .commands
        .dispatch(&name, ctx.command_ctx.clone(), args)
        .await?;
    Ok(Json(value))
}
