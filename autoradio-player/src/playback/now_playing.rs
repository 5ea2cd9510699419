//! Periodic now-playing refresh
//!
//! Independent timer task that reads [`PlaybackEngine::snapshot`] and
//! broadcasts it. It never mutates engine state, and a snapshot taken
//! mid-transition is simply reported as-is.

use crate::playback::engine::PlaybackEngine;
use autoradio_common::events::RadioEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Emit `RadioEvent::NowPlaying` every `interval` while a track is active
pub fn spawn_now_playing(
    engine: Arc<PlaybackEngine>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let info = engine.snapshot().await;
            if !info.state.is_active() {
                continue;
            }
            engine.events().emit_lossy(RadioEvent::NowPlaying {
                info,
                timestamp: chrono::Utc::now(),
            });
        }
        debug!("Now-playing refresh stopped");
    })
}
