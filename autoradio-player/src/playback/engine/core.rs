//! Core playback engine - construction, initialization and read-only views
//!
//! **Responsibilities:**
//! - PlaybackEngine struct definition and collaborator wiring
//! - Session state (state, volume, EQ, retry count, progress, active decode)
//! - Loading per-guild settings from the store on startup
//! - Cancellation tokens shared by the advance loop and retry tasks
//! - Snapshot, queue listing and statistics queries
//!
//! **Locking:**
//! `op_lock` serialises every state transition. `queue` and `session` are
//! only ever held for short, non-suspending sections, and never while
//! acquiring `op_lock`.

use crate::catalog::CatalogCache;
use crate::config::TomlConfig;
use crate::error::Result;
use crate::playback::equalizer::EqualizerMode;
use crate::playback::pipeline::{AudioPipeline, DecodeHandle};
use crate::playback::progress::ProgressTracker;
use crate::playback::queue::Queue;
use crate::resolver::SourceResolver;
use crate::store::{SessionStore, SettingUpdate};
use crate::transport::VoiceTransport;
use autoradio_common::events::{EventBus, NowPlayingInfo, PlaybackState, RadioEvent, TrackInfo};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine tuning, derived from the bootstrap config
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub guild_id: String,
    pub voice_channel_id: Option<String>,
    pub default_volume: u8,
    pub max_volume: u8,
    pub default_eq: EqualizerMode,
    pub shuffle_default: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Wait after `max_retries` consecutive failures
    pub cooldown: Duration,
    pub recent_window_hours: u32,
    /// Fallback entries resolved per refill
    pub enrich_limit: usize,
    pub reconnect_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

impl EngineConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            guild_id: config.guild_id.clone(),
            voice_channel_id: config.voice_channel_id.clone(),
            default_volume: config.player.default_volume,
            max_volume: config.player.max_volume,
            default_eq: config.player.default_eq,
            shuffle_default: config.autoplay.shuffle_default,
            max_retries: config.autoplay.max_retries,
            retry_delay: config.autoplay.retry_delay(),
            cooldown: config.autoplay.cooldown(),
            recent_window_hours: config.autoplay.recent_window_hours,
            enrich_limit: config.autoplay.enrich_limit,
            reconnect_grace: config.autoplay.reconnect_grace(),
        }
    }
}

/// Collaborators the engine drives
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn SessionStore>,
    pub catalog: Arc<CatalogCache>,
    pub resolver: Arc<dyn SourceResolver>,
    pub pipeline: Arc<dyn AudioPipeline>,
    pub transport: Arc<dyn VoiceTransport>,
    pub events: Arc<EventBus>,
}

/// Mutable playback session, owned by the engine
pub(super) struct Session {
    pub(super) state: PlaybackState,
    pub(super) volume_percent: u8,
    pub(super) eq: EqualizerMode,
    /// Consecutive failures since the last successful start
    pub(super) retry_count: u32,
    pub(super) progress: ProgressTracker,
    /// Id of the stream the transport is currently playing
    pub(super) active_stream: Option<Uuid>,
    /// Exclusive owner of the running decode processes
    pub(super) decode: Option<DecodeHandle>,
    pub(super) voice_channel_id: Option<String>,
    /// Last advance found nothing to play, even after refill
    pub(super) queue_exhausted: bool,
}

/// Cancellation scopes
///
/// `session` lives until stop. `op` is a child of `session` and is replaced
/// every time a command interrupts the operation in flight.
pub(super) struct Tokens {
    pub(super) session: CancellationToken,
    pub(super) op: CancellationToken,
}

impl Tokens {
    fn new() -> Self {
        let session = CancellationToken::new();
        let op = session.child_token();
        Self { session, op }
    }
}

/// Queue listing for front-ends
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub current: Option<TrackInfo>,
    pub upcoming: Vec<TrackInfo>,
    pub total_duration_secs: u64,
    pub shuffle: bool,
}

/// Play statistics for the session's guild
#[derive(Debug, Clone, Serialize)]
pub struct PlayStats {
    pub total_plays: u64,
    pub queue_length: usize,
    pub history_length: usize,
    pub catalog_size: usize,
    pub state: PlaybackState,
}

/// Playback engine - drives queue, decode pipeline and voice transport
pub struct PlaybackEngine {
    pub(super) config: EngineConfig,
    pub(super) deps: EngineDeps,

    /// Serialises transitions (advance, skip, stop, EQ restart, pause)
    pub(super) op_lock: Mutex<()>,

    pub(super) queue: RwLock<Queue>,
    pub(super) session: RwLock<Session>,
    pub(super) tokens: RwLock<Tokens>,
}

impl PlaybackEngine {
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Arc<Self> {
        Self::with_queue(config, deps, None)
    }

    /// Engine with a seeded shuffle, for reproducible ordering
    pub fn with_seed(config: EngineConfig, deps: EngineDeps, seed: u64) -> Arc<Self> {
        Self::with_queue(config, deps, Some(seed))
    }

    fn with_queue(config: EngineConfig, deps: EngineDeps, seed: Option<u64>) -> Arc<Self> {
        let queue = match seed {
            Some(seed) => Queue::with_seed(config.shuffle_default, seed),
            None => Queue::new(config.shuffle_default),
        };
        let session = Session {
            state: PlaybackState::Idle,
            volume_percent: config.default_volume.min(config.max_volume),
            eq: config.default_eq,
            retry_count: 0,
            progress: ProgressTracker::new(),
            active_stream: None,
            decode: None,
            voice_channel_id: config.voice_channel_id.clone(),
            queue_exhausted: false,
        };

        Arc::new(Self {
            config,
            deps,
            op_lock: Mutex::new(()),
            queue: RwLock::new(queue),
            session: RwLock::new(session),
            tokens: RwLock::new(Tokens::new()),
        })
    }

    /// Load per-guild settings, writing config defaults for a new guild
    pub async fn initialize(&self) -> Result<()> {
        let guild = &self.config.guild_id;
        let settings = match self.deps.store.get_settings(guild).await? {
            Some(settings) => settings,
            None => {
                info!(guild = %guild, "No stored settings, using defaults");
                let defaults = [
                    SettingUpdate::Volume(self.config.default_volume.min(self.config.max_volume)),
                    SettingUpdate::ShuffleMode(self.config.shuffle_default),
                    SettingUpdate::EqMode(self.config.default_eq),
                ];
                for update in defaults {
                    self.deps.store.update_setting(guild, update).await?;
                }
                match self.deps.store.get_settings(guild).await? {
                    Some(settings) => settings,
                    None => return Ok(()),
                }
            }
        };

        {
            let mut session = self.session.write().await;
            session.volume_percent = settings.volume.min(self.config.max_volume);
            session.eq = settings.eq_mode;
            if settings.voice_channel_id.is_some() {
                session.voice_channel_id = settings.voice_channel_id.clone();
            }
        }
        self.queue.write().await.set_shuffle(settings.shuffle_mode);

        info!(
            guild = %guild,
            volume = settings.volume,
            shuffle = settings.shuffle_mode,
            eq = %settings.eq_mode,
            "Playback engine initialized"
        );
        Ok(())
    }

    pub fn guild_id(&self) -> &str {
        &self.config.guild_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.deps.events
    }

    pub fn catalog(&self) -> &Arc<CatalogCache> {
        &self.deps.catalog
    }

    pub async fn state(&self) -> PlaybackState {
        self.session.read().await.state
    }

    pub async fn volume(&self) -> u8 {
        self.session.read().await.volume_percent
    }

    pub async fn equalizer(&self) -> EqualizerMode {
        self.session.read().await.eq
    }

    pub async fn retry_count(&self) -> u32 {
        self.session.read().await.retry_count
    }

    pub async fn elapsed(&self) -> Duration {
        self.session.read().await.progress.elapsed()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.read().await.len()
    }

    pub async fn current_track(&self) -> Option<TrackInfo> {
        self.queue.read().await.current().map(|t| t.to_info())
    }

    /// Read-only view of the session for status displays
    pub async fn snapshot(&self) -> NowPlayingInfo {
        let (state, elapsed_secs, duration_secs, volume_percent, eq, retry_count) = {
            let session = self.session.read().await;
            (
                session.state,
                session.progress.elapsed_secs(),
                session.progress.duration_secs(),
                session.volume_percent,
                session.eq,
                session.retry_count,
            )
        };

        let queue = self.queue.read().await;
        let track = if state == PlaybackState::Stopped || state == PlaybackState::Idle {
            None
        } else {
            queue.current().map(|t| t.to_info())
        };

        NowPlayingInfo {
            state,
            track,
            next: queue.peek(1).first().map(|t| t.to_info()),
            elapsed_secs,
            duration_secs,
            volume_percent,
            equalizer: eq.to_string(),
            shuffle: queue.is_shuffled(),
            queue_length: queue.len(),
            retry_count,
        }
    }

    /// Current track plus up to `limit` upcoming tracks
    pub async fn queue_view(&self, limit: usize) -> QueueView {
        let queue = self.queue.read().await;
        QueueView {
            current: queue.current().map(|t| t.to_info()),
            upcoming: queue.peek(limit).into_iter().map(|t| t.to_info()).collect(),
            total_duration_secs: queue.total_duration_secs(),
            shuffle: queue.is_shuffled(),
        }
    }

    pub async fn stats(&self) -> Result<PlayStats> {
        let total_plays = self.deps.store.play_count(&self.config.guild_id).await?;
        let (queue_length, history_length) = {
            let queue = self.queue.read().await;
            (queue.len(), queue.history_len())
        };
        Ok(PlayStats {
            total_plays,
            queue_length,
            history_length,
            catalog_size: self.deps.catalog.len().await,
            state: self.state().await,
        })
    }

    /// Set state and notify on change
    pub(super) async fn set_state(&self, new_state: PlaybackState) {
        let old_state = {
            let mut session = self.session.write().await;
            std::mem::replace(&mut session.state, new_state)
        };
        if old_state != new_state {
            debug!("Playback state: {} -> {}", old_state, new_state);
            self.deps.events.emit_lossy(RadioEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub(super) fn emit(&self, event: RadioEvent) {
        self.deps.events.emit_lossy(event);
    }

    pub(super) async fn emit_queue_changed(&self) {
        let length = self.queue.read().await.len();
        self.emit(RadioEvent::QueueChanged {
            length,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Token of the operation currently allowed to run
    pub(super) async fn current_token(&self) -> CancellationToken {
        self.tokens.read().await.op.clone()
    }

    /// Cancel the operation in flight and hand out a fresh token
    pub(super) async fn interrupt(&self) -> CancellationToken {
        let mut tokens = self.tokens.write().await;
        tokens.op.cancel();
        tokens.op = tokens.session.child_token();
        tokens.op.clone()
    }

    /// Cancel everything tied to the session, including background tasks
    pub(super) async fn reset_session_token(&self) -> CancellationToken {
        let mut tokens = self.tokens.write().await;
        tokens.session.cancel();
        *tokens = Tokens::new();
        tokens.op.clone()
    }

    pub(super) async fn session_child_token(&self) -> CancellationToken {
        self.tokens.read().await.session.child_token()
    }

    /// Persist a setting; failures are logged, never fatal to playback
    pub(super) async fn persist(&self, update: SettingUpdate) {
        let key = update.key();
        if let Err(e) = self
            .deps
            .store
            .update_setting(&self.config.guild_id, update)
            .await
        {
            warn!("Failed to persist setting {}: {}", key, e);
        }
    }
}
