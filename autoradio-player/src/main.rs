//! Autoradio Player (autoradio-player) - Main entry point
//!
//! Wires the playback engine to its collaborators (SQLite store, yt-dlp
//! resolver and catalog, ffmpeg decode pipeline, sink transport), starts
//! the background tasks, and serves the HTTP control surface.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use autoradio_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use autoradio_common::events::EventBus;
use autoradio_player::api::{self, AppContext};
use autoradio_player::catalog::{
    CatalogCache, CatalogRefresher, CatalogSource, RefreshSettings, YtDlpSearchCatalog,
};
use autoradio_player::config::TomlConfig;
use autoradio_player::db::SqliteStore;
use autoradio_player::playback::now_playing::spawn_now_playing;
use autoradio_player::playback::pipeline::ProcessPipeline;
use autoradio_player::playback::{EngineConfig, EngineDeps, PlaybackEngine};
use autoradio_player::resolver::{SourceResolver, YtDlpResolver};
use autoradio_player::store::SessionStore;
use autoradio_player::transport::SinkTransport;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for autoradio-player
#[derive(Parser, Debug)]
#[command(name = "autoradio-player")]
#[command(about = "24/7 voice radio playback engine")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "AUTORADIO_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "AUTORADIO_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides config)
    #[arg(short, long, env = "AUTORADIO_DATABASE")]
    database: Option<PathBuf>,

    /// Guild/session id (overrides config)
    #[arg(short, long, env = "AUTORADIO_GUILD_ID")]
    guild_id: Option<String>,

    /// Sink output file or FIFO (overrides config)
    #[arg(short, long, env = "AUTORADIO_OUTPUT")]
    output: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    let path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to locate configuration")?;
    let mut config = match &path {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => TomlConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = &args.database {
        config.database_path = database.clone();
    }
    if let Some(guild_id) = &args.guild_id {
        config.guild_id = guild_id.clone();
    }
    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting autoradio-player v{}", env!("CARGO_PKG_VERSION"));
    info!("Guild: {}", config.guild_id);

    let store = SqliteStore::open(&config.database_path)
        .await
        .context("Failed to open database")?;
    let store: Arc<dyn SessionStore> = Arc::new(store);

    let events = Arc::new(EventBus::new(256));
    let cache = Arc::new(CatalogCache::new());
    let resolver: Arc<dyn SourceResolver> = Arc::new(YtDlpResolver::new(
        config.resolver.program.clone(),
        config.resolver.timeout(),
    ));

    let search: Arc<dyn CatalogSource> = Arc::new(YtDlpSearchCatalog::new(
        config.resolver.program.clone(),
        config.catalog.search_queries.clone(),
        config.catalog.max_songs,
        config.resolver.timeout(),
    ));
    let refresher = Arc::new(CatalogRefresher::new(
        vec![search],
        Arc::clone(&resolver),
        Arc::clone(&cache),
        Arc::clone(&store),
        Arc::clone(&events),
        RefreshSettings {
            max_songs: config.catalog.max_songs,
            enrich_pause_every: config.catalog.enrich_pause_every,
            enrich_pause: config.catalog.enrich_pause(),
        },
    ));
    if let Err(e) = refresher.warm_start().await {
        warn!("Catalog warm start failed: {}", e);
    }

    let (transport, transport_events) = SinkTransport::new(config.output.path.clone());
    let pipeline = Arc::new(ProcessPipeline::new(config.pipeline.to_pipeline_config()));

    let engine = PlaybackEngine::new(
        EngineConfig::from_toml(&config),
        EngineDeps {
            store,
            catalog: cache,
            resolver,
            pipeline,
            transport,
            events,
        },
    );
    engine
        .initialize()
        .await
        .context("Failed to initialize playback engine")?;
    engine.spawn_event_loop(transport_events);
    info!("Playback engine initialized");

    let shutdown = CancellationToken::new();
    engine.spawn_refresh_listener(shutdown.child_token());
    Arc::clone(&refresher).spawn(config.catalog.refresh_interval(), shutdown.child_token());
    spawn_now_playing(
        Arc::clone(&engine),
        config.now_playing.update_interval(),
        shutdown.child_token(),
    );

    if config.autoplay.enabled {
        let engine = Arc::clone(&engine);
        let delay = config.autoplay.startup_delay();
        let cancel = shutdown.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            info!("Auto-join: starting the radio");
            if let Err(e) = engine.join_and_play().await {
                error!("Auto-join failed: {}", e);
            }
        });
    }

    let ctx = AppContext::new(Arc::clone(&engine), Some(refresher), config.port)
        .context("Failed to build command table")?;
    let app = api::create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    engine.stop().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
