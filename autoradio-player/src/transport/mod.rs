//! Voice transport boundary
//!
//! The engine hands each decoded [`AudioStream`] to a [`VoiceTransport`] and
//! learns what happened to it from [`TransportEvent`]s delivered on an mpsc
//! channel. Stream-scoped events carry the id of the stream they refer to
//! so the engine can ignore events for a stream it has already replaced.
//!
//! Voice protocol framing is not implemented here. The shipped
//! [`SinkTransport`] writes the encoded stream to a file, FIFO or nowhere.

mod sink;

pub use sink::SinkTransport;

use crate::playback::pipeline::AudioStream;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("voice transport is not connected")]
    NotConnected,

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Events emitted by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Stream started (or resumed) playing
    Playing { stream_id: Uuid },
    Paused { stream_id: Uuid },
    /// Stream ended on its own
    Idle { stream_id: Uuid },
    Error { stream_id: Uuid, message: String },
    /// Connection lost; may heal on its own within the reconnect grace
    Disconnected,
}

impl TransportEvent {
    pub fn stream_id(&self) -> Option<Uuid> {
        match self {
            TransportEvent::Playing { stream_id }
            | TransportEvent::Paused { stream_id }
            | TransportEvent::Idle { stream_id }
            | TransportEvent::Error { stream_id, .. } => Some(*stream_id),
            TransportEvent::Disconnected => None,
        }
    }
}

/// Live voice session the engine plays into
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Join the given channel (or the transport's default)
    async fn connect(&self, channel_id: Option<&str>) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Replace whatever is playing with `stream`
    async fn play(&self, stream: AudioStream) -> Result<(), TransportError>;

    /// Returns false if nothing was playing
    async fn pause(&self) -> bool;

    /// Returns false if nothing was paused
    async fn unpause(&self) -> bool;

    /// Stop the current stream without emitting `Idle`
    async fn stop(&self);

    /// Linear gain, 0.0 to 2.0
    async fn set_volume(&self, volume: f32);

    /// After `Disconnected`, wait up to `grace` for the connection to heal.
    ///
    /// Returns true if it did (transient re-signalling), false for a real
    /// disconnect.
    async fn await_reconnect(&self, grace: Duration) -> bool;

    /// Leave the channel and release the session
    async fn disconnect(&self);
}
