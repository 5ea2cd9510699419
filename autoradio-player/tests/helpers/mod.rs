//! Shared test collaborators for engine, catalog and API tests
#![allow(dead_code)]

use async_trait::async_trait;
use autoradio_common::events::{EventBus, RadioEvent};
use autoradio_player::catalog::{CatalogCache, CatalogEntry, CatalogSource};
use autoradio_player::error::{Error, Result};
use autoradio_player::playback::equalizer::EqualizerMode;
use autoradio_player::playback::pipeline::{
    AudioPipeline, AudioStream, DecodeHandle, DecodeOutput, DecodeRequest, PipelineError,
};
use autoradio_player::playback::{EngineConfig, EngineDeps, PlaybackEngine};
use autoradio_player::resolver::SourceResolver;
use autoradio_player::store::{Favorite, GuildSettings, SessionStore, SettingUpdate};
use autoradio_player::track::{ResolvedSource, Track};
use autoradio_player::transport::{TransportError, VoiceTransport};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    settings: Mutex<HashMap<String, GuildSettings>>,
    plays: Mutex<Vec<(String, Track)>>,
    recent: Mutex<HashSet<String>>,
    catalog: Mutex<Vec<CatalogEntry>>,
    /// Newest first, per user
    favorites: Mutex<HashMap<String, Vec<Favorite>>>,
    pub saved_catalog_source: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(guild_id: &str, settings: GuildSettings) -> Self {
        let store = Self::default();
        store
            .settings
            .lock()
            .unwrap()
            .insert(guild_id.to_string(), settings);
        store
    }

    /// Pretend `source_id` was played inside the window
    pub fn mark_recent(&self, source_id: &str) {
        self.recent.lock().unwrap().insert(source_id.to_string());
    }

    pub fn played_titles(&self) -> Vec<String> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.title.clone())
            .collect()
    }

    pub fn settings_for(&self, guild_id: &str) -> Option<GuildSettings> {
        self.settings.lock().unwrap().get(guild_id).cloned()
    }

    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.catalog.lock().unwrap().clone()
    }
}

fn default_settings() -> GuildSettings {
    GuildSettings {
        volume: 50,
        shuffle_mode: true,
        eq_mode: EqualizerMode::Normal,
        voice_channel_id: None,
        text_channel_id: None,
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_settings(&self, guild_id: &str) -> Result<Option<GuildSettings>> {
        Ok(self.settings.lock().unwrap().get(guild_id).cloned())
    }

    async fn update_setting(&self, guild_id: &str, update: SettingUpdate) -> Result<()> {
        let mut settings = self.settings.lock().unwrap();
        let entry = settings
            .entry(guild_id.to_string())
            .or_insert_with(default_settings);
        update.apply(entry);
        Ok(())
    }

    async fn is_recently_played(&self, _guild_id: &str, source_id: &str, _hours: u32) -> Result<bool> {
        Ok(self.recent.lock().unwrap().contains(source_id))
    }

    async fn recently_played(&self, _guild_id: &str, _hours: u32) -> Result<HashSet<String>> {
        Ok(self.recent.lock().unwrap().clone())
    }

    async fn record_play(&self, guild_id: &str, track: &Track) -> Result<()> {
        self.plays
            .lock()
            .unwrap()
            .push((guild_id.to_string(), track.clone()));
        Ok(())
    }

    async fn play_count(&self, guild_id: &str) -> Result<u64> {
        Ok(self
            .plays
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| g == guild_id)
            .count() as u64)
    }

    async fn save_catalog(&self, entries: &[CatalogEntry], source: &str) -> Result<()> {
        *self.catalog.lock().unwrap() = entries.to_vec();
        *self.saved_catalog_source.lock().unwrap() = Some(source.to_string());
        Ok(())
    }

    async fn latest_catalog(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn add_favorite(&self, user_id: &str, favorite: &Favorite) -> Result<bool> {
        let mut favorites = self.favorites.lock().unwrap();
        let saved = favorites.entry(user_id.to_string()).or_default();
        if saved.iter().any(|f| f.source_id == favorite.source_id) {
            return Ok(false);
        }
        saved.insert(0, favorite.clone());
        Ok(true)
    }

    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>> {
        Ok(self
            .favorites
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_favorite(&self, user_id: &str, source_id: &str) -> Result<bool> {
        let mut favorites = self.favorites.lock().unwrap();
        let Some(saved) = favorites.get_mut(user_id) else {
            return Ok(false);
        };
        let before = saved.len();
        saved.retain(|f| f.source_id != source_id);
        Ok(saved.len() < before)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves queries from a table; optionally invents a source for anything else
#[derive(Default)]
pub struct MapResolver {
    map: HashMap<String, ResolvedSource>,
    resolve_everything: bool,
    calls: AtomicUsize,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query resolves to a source derived from its text
    pub fn everything() -> Self {
        Self {
            resolve_everything: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, query: &str, source: ResolvedSource) -> Self {
        self.map.insert(query.to_string(), source);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

#[async_trait]
impl SourceResolver for MapResolver {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedSource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(source) = self.map.get(query) {
            return Ok(Some(source.clone()));
        }
        if self.resolve_everything {
            return Ok(Some(source(&slug(query))));
        }
        Ok(None)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Ok,
    Fail,
    /// Never becomes usable
    Hang,
}

/// Pipeline whose launch results follow a script (`Ok` once the script runs out)
#[derive(Default)]
pub struct ScriptedPipeline {
    script: Mutex<VecDeque<Outcome>>,
    launches: Mutex<Vec<DecodeRequest>>,
}

impl ScriptedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, outcomes: &[Outcome]) {
        self.script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn launches(&self) -> Vec<DecodeRequest> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

#[async_trait]
impl AudioPipeline for ScriptedPipeline {
    async fn launch(&self, request: DecodeRequest) -> std::result::Result<DecodeOutput, PipelineError> {
        self.launches.lock().unwrap().push(request);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Ok);
        match outcome {
            Outcome::Ok => {
                let id = Uuid::new_v4();
                Ok(DecodeOutput {
                    handle: DecodeHandle::detached(id),
                    stream: AudioStream::from_bytes(id, vec![0u8; 64]),
                })
            }
            Outcome::Fail => Err(PipelineError::SafetyTimeout(Duration::from_secs(10))),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport that records what it was asked to do; events are injected by
/// the test through `PlaybackEngine::handle_transport_event`
#[derive(Default)]
pub struct RecordingTransport {
    connected: AtomicBool,
    failing_connects: AtomicU32,
    heals: AtomicBool,
    paused: AtomicBool,
    streams: Mutex<Vec<Uuid>>,
    volume: Mutex<f32>,
    stops: AtomicU32,
    connects: AtomicU32,
    connect_delay: Mutex<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` connect attempts
    pub fn fail_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Make each connect attempt take `delay` before it resolves
    pub fn slow_connects(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    pub fn is_connected_now(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether `await_reconnect` reports a self-healed connection
    pub fn set_heals(&self, heals: bool) {
        self.heals.store(heals, Ordering::SeqCst);
    }

    pub fn last_stream(&self) -> Option<Uuid> {
        self.streams.lock().unwrap().last().copied()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceTransport for RecordingTransport {
    async fn connect(&self, _channel_id: Option<&str>) -> std::result::Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::Connect("refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn play(&self, stream: AudioStream) -> std::result::Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.paused.store(false, Ordering::SeqCst);
        self.streams.lock().unwrap().push(stream.id());
        Ok(())
    }

    async fn pause(&self) -> bool {
        !self.streams.lock().unwrap().is_empty() && !self.paused.swap(true, Ordering::SeqCst)
    }

    async fn unpause(&self) -> bool {
        self.paused.swap(false, Ordering::SeqCst)
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    async fn set_volume(&self, volume: f32) {
        *self.volume.lock().unwrap() = volume;
    }

    async fn await_reconnect(&self, _grace: Duration) -> bool {
        self.heals.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Catalog source
// ============================================================================

/// Catalog source returning a fixed list
pub struct StaticSource {
    name: &'static str,
    entries: Vec<CatalogEntry>,
}

impl StaticSource {
    pub fn new(name: &'static str, entries: Vec<CatalogEntry>) -> Self {
        Self { name, entries }
    }
}

#[async_trait]
impl CatalogSource for StaticSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_candidates(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }
}

/// Catalog source that always fails
pub struct BrokenSource;

#[async_trait]
impl CatalogSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn fetch_candidates(&self) -> Result<Vec<CatalogEntry>> {
        Err(Error::Internal("scrape failed".to_string()))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn source(source_id: &str) -> ResolvedSource {
    ResolvedSource {
        duration_secs: 180,
        title: Some(source_id.to_string()),
        uploader: Some("Uploader".to_string()),
        ..ResolvedSource::from_source_id(source_id)
    }
}

pub fn resolved_track(title: &str, source_id: &str) -> Track {
    Track::new(title, "Artist").with_source(source(source_id))
}

pub fn resolved_entry(title: &str, rank: u32, source_id: &str) -> CatalogEntry {
    let mut entry = CatalogEntry::new(title, "Artist", rank);
    entry.source = Some(source(source_id));
    entry
}

/// Deterministic, fast engine settings
pub fn test_config() -> EngineConfig {
    EngineConfig {
        guild_id: "guild-1".to_string(),
        shuffle_default: false,
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: Arc<PlaybackEngine>,
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<MapResolver>,
    pub pipeline: Arc<ScriptedPipeline>,
    pub transport: Arc<RecordingTransport>,
    pub catalog: Arc<CatalogCache>,
    pub events: Arc<EventBus>,
}

impl Harness {
    pub fn new(config: EngineConfig, resolver: MapResolver) -> Self {
        Self::with_store(config, resolver, MemoryStore::new())
    }

    pub fn with_store(config: EngineConfig, resolver: MapResolver, store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let resolver = Arc::new(resolver);
        let pipeline = Arc::new(ScriptedPipeline::new());
        let transport = Arc::new(RecordingTransport::new());
        let catalog = Arc::new(CatalogCache::new());
        let events = Arc::new(EventBus::new(1024));

        let engine = PlaybackEngine::with_seed(
            config,
            EngineDeps {
                store: store.clone(),
                catalog: catalog.clone(),
                resolver: resolver.clone(),
                pipeline: pipeline.clone(),
                transport: transport.clone(),
                events: events.clone(),
            },
            7,
        );

        Self {
            engine,
            store,
            resolver,
            pipeline,
            transport,
            catalog,
            events,
        }
    }

    pub async fn current_title(&self) -> Option<String> {
        self.engine.current_track().await.map(|t| t.title)
    }
}

/// Everything received so far, without waiting
pub fn drain(rx: &mut broadcast::Receiver<RadioEvent>) -> Vec<RadioEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_types(events: &[RadioEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}
