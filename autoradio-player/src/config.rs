//! Bootstrap configuration for autoradio-player
//!
//! Two tiers, as elsewhere in autoradio:
//! 1. **TOML bootstrap**: database path, port, external program arguments,
//!    timing constants (static, read once at startup)
//! 2. **Database runtime**: per-guild volume, shuffle, equalizer and channel
//!    ids from the `guild_settings` table, which override the TOML defaults
//!    when the engine initializes
//!
//! Every field has a built-in default, so an empty file (or no file at all)
//! yields a working configuration.

use crate::error::{Error, Result};
use crate::playback::equalizer::EqualizerMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Session (guild) this player instance serves
    #[serde(default = "default_guild_id")]
    pub guild_id: String,

    /// Path to SQLite database file (relative or absolute)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Voice channel joined on startup (optional)
    #[serde(default)]
    pub voice_channel_id: Option<String>,

    /// Text channel used for notifications (optional)
    #[serde(default)]
    pub text_channel_id: Option<String>,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub autoplay: AutoplayConfig,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub now_playing: NowPlayingConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_guild_id() -> String {
    "default".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("autoradio.db")
}

fn default_port() -> u16 {
    5750
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            guild_id: default_guild_id(),
            database_path: default_database_path(),
            port: default_port(),
            voice_channel_id: None,
            text_channel_id: None,
            player: PlayerConfig::default(),
            autoplay: AutoplayConfig::default(),
            pipeline: PipelineSection::default(),
            resolver: ResolverConfig::default(),
            catalog: CatalogConfig::default(),
            now_playing: NowPlayingConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.player.max_volume == 0 || self.player.max_volume > 200 {
            return Err(Error::Config(format!(
                "player.max_volume must be in 1..=200, got {}",
                self.player.max_volume
            )));
        }
        if self.player.default_volume > self.player.max_volume {
            return Err(Error::Config(format!(
                "player.default_volume ({}) exceeds player.max_volume ({})",
                self.player.default_volume, self.player.max_volume
            )));
        }
        if !self.pipeline.fetch_args.iter().any(|a| a.contains("{url}")) {
            return Err(Error::Config(
                "pipeline.fetch_args must contain the {url} placeholder".to_string(),
            ));
        }
        if self.pipeline.safety_ms < self.pipeline.grace_ms {
            return Err(Error::Config(
                "pipeline.safety_ms must not be shorter than pipeline.grace_ms".to_string(),
            ));
        }
        if self.now_playing.update_interval_ms == 0 {
            return Err(Error::Config(
                "now_playing.update_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Volume and equalizer defaults for new sessions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume percent applied when the store has no value
    pub default_volume: u8,
    /// Upper clamp for `set_volume`
    pub max_volume: u8,
    pub default_eq: EqualizerMode,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 50,
            max_volume: 100,
            default_eq: EqualizerMode::Normal,
        }
    }
}

/// Auto-play, retry and reconnect policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoplayConfig {
    /// Join and start playing on startup
    pub enabled: bool,
    pub startup_delay_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Pause after `max_retries` consecutive failures
    pub cooldown_ms: u64,
    pub shuffle_default: bool,
    /// Recently-played suppression window for auto tracks
    pub recent_window_hours: u32,
    /// How many fallback entries are resolved during a refill
    pub enrich_limit: usize,
    /// How long a dropped connection may take to recover on its own
    pub reconnect_grace_ms: u64,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            startup_delay_ms: 3000,
            max_retries: 3,
            retry_delay_ms: 5000,
            cooldown_ms: 30_000,
            shuffle_default: true,
            recent_window_hours: 2,
            enrich_limit: 20,
            reconnect_grace_ms: 5000,
        }
    }
}

impl AutoplayConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }
}

/// External decode pipeline programs and liveness timeouts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub fetch_program: String,
    /// Fetch-stage arguments; `{url}` is replaced with the source URL
    pub fetch_args: Vec<String>,
    pub transcode_program: String,
    /// Transcode-stage arguments; `{filters}` expands to `-af <graph>` or nothing
    pub transcode_args: Vec<String>,
    pub grace_ms: u64,
    pub safety_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = crate::playback::pipeline::PipelineConfig::default();
        Self {
            fetch_program: defaults.fetch_program,
            fetch_args: defaults.fetch_args,
            transcode_program: defaults.transcode_program,
            transcode_args: defaults.transcode_args,
            grace_ms: defaults.grace.as_millis() as u64,
            safety_ms: defaults.safety.as_millis() as u64,
        }
    }
}

impl PipelineSection {
    /// Convert to the runtime pipeline configuration
    pub fn to_pipeline_config(&self) -> crate::playback::pipeline::PipelineConfig {
        crate::playback::pipeline::PipelineConfig {
            fetch_program: self.fetch_program.clone(),
            fetch_args: self.fetch_args.clone(),
            transcode_program: self.transcode_program.clone(),
            transcode_args: self.transcode_args.clone(),
            grace: Duration::from_millis(self.grace_ms),
            safety: Duration::from_millis(self.safety_ms),
        }
    }
}

/// Text query to playable source lookup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub program: String,
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            timeout_ms: 20_000,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Catalog refresh schedule and search sources
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub refresh_interval_secs: u64,
    pub max_songs: usize,
    /// Search queries tried in order by the yt-dlp catalog source
    pub search_queries: Vec<String>,
    /// Pause after every N enrichment lookups
    pub enrich_pause_every: usize,
    pub enrich_pause_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 6 * 60 * 60,
            max_songs: 50,
            search_queries: vec![
                "TikTok trending songs 2024".to_string(),
                "TikTok viral songs this week".to_string(),
                "most popular TikTok sounds 2024".to_string(),
            ],
            enrich_pause_every: 5,
            enrich_pause_ms: 1000,
        }
    }
}

impl CatalogConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn enrich_pause(&self) -> Duration {
        Duration::from_millis(self.enrich_pause_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NowPlayingConfig {
    pub update_interval_ms: u64,
}

impl Default for NowPlayingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 15_000,
        }
    }
}

impl NowPlayingConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Where the sink transport writes encoded audio
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File or FIFO path; audio is discarded when unset
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
