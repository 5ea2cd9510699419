//! Event types for the autoradio event system
//!
//! Provides shared event definitions and the EventBus used by the player to
//! notify front-ends. Notifications are fire-and-forget: a missing or slow
//! subscriber never affects playback.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing, waiting for a trigger
    Idle,
    /// Looking up a playable source for the dequeued track
    Resolving,
    /// Decode pipeline starting
    Loading,
    /// Audio flowing to the transport
    Playing,
    /// Transport paused, decode pipeline kept alive
    Paused,
    /// Backoff delay after a failure
    Retrying,
    /// Session torn down
    Stopped,
}

impl PlaybackState {
    /// True while a track is owned by the transport (playing or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Resolving => "resolving",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Retrying => "retrying",
            PlaybackState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Track information for events and API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub source_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u64,
    pub rank: u32,
    pub is_manual_request: bool,
    pub requested_by: String,
}

/// Read-only snapshot of the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub state: PlaybackState,
    pub track: Option<TrackInfo>,
    pub next: Option<TrackInfo>,
    pub elapsed_secs: u64,
    pub duration_secs: u64,
    pub volume_percent: u8,
    pub equalizer: String,
    pub shuffle: bool,
    pub queue_length: usize,
    pub retry_count: u32,
}

/// Autoradio event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RadioEvent {
    /// Playback state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track started playing
    TrackStarted {
        track: TrackInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The decode pipeline or transport failed; playback will retry or skip
    PipelineError {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Reconnect / retry attempt in progress
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// No track available even after catalog refill
    QueueExhausted {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed (notification only)
    QueueChanged {
        length: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed
    VolumeChanged {
        volume_percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Equalizer preset changed
    EqualizerChanged {
        mode: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shuffle mode toggled
    ShuffleChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic now-playing refresh
    NowPlaying {
        info: NowPlayingInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Catalog cache replaced after a fetch
    CatalogRefreshed {
        track_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RadioEvent {
    /// Event type name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RadioEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            RadioEvent::TrackStarted { .. } => "TrackStarted",
            RadioEvent::PipelineError { .. } => "PipelineError",
            RadioEvent::Reconnecting { .. } => "Reconnecting",
            RadioEvent::QueueExhausted { .. } => "QueueExhausted",
            RadioEvent::QueueChanged { .. } => "QueueChanged",
            RadioEvent::VolumeChanged { .. } => "VolumeChanged",
            RadioEvent::EqualizerChanged { .. } => "EqualizerChanged",
            RadioEvent::ShuffleChanged { .. } => "ShuffleChanged",
            RadioEvent::NowPlaying { .. } => "NowPlaying",
            RadioEvent::CatalogRefreshed { .. } => "CatalogRefreshed",
        }
    }
}

/// One-to-many event broadcaster
///
/// Wraps a `tokio::sync::broadcast` channel. Slow subscribers lag and lose
/// the oldest events rather than blocking the emitter.
pub struct EventBus {
    tx: broadcast::Sender<RadioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use autoradio_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// assert_eq!(event_bus.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RadioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RadioEvent,
    ) -> Result<usize, broadcast::error::SendError<RadioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
