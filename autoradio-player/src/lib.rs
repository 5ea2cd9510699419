//! # Autoradio Player Library (autoradio-player)
//!
//! Playback pipeline and queue engine for a 24/7 voice-channel radio.
//!
//! **Purpose:** Keep a voice session fed with audio: pick tracks from a
//! priority queue that refills itself from a rotating catalog, turn each
//! track into an encoded byte stream through an external fetch + transcode
//! pipeline, and recover from resolution, pipeline and transport failures
//! without ever stopping on its own.
//!
//! **Architecture:** `PlaybackEngine` drives a `Queue`, an `AudioPipeline`
//! and a `VoiceTransport`, backed by a `SessionStore` for settings and
//! history, with an HTTP/SSE control surface on top.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;
pub mod resolver;
pub mod store;
pub mod track;
pub mod transport;

pub use error::{Error, Result};
