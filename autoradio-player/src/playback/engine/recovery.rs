//! Transport events, retry policy and rejoin
//!
//! **Responsibilities:**
//! - Transport event loop (end of stream, errors, disconnects)
//! - Retry/backoff: `max_retries` attempts `retry_delay` apart, then a
//!   cooldown that resets the counter and moves to the next track
//! - Join with connection retries, and full rejoin after a real disconnect
//! - Restart after queue exhaustion once a catalog refresh lands
//!
//! Backoff waits run in spawned tasks without `op_lock`, so commands stay
//! responsive while a retry is pending. The task re-checks its token after
//! taking the lock.

use super::core::PlaybackEngine;
use super::playback::{gain, Advance};
use crate::error::{Error, Result};
use crate::transport::TransportEvent;
use autoradio_common::events::{PlaybackState, RadioEvent};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

impl PlaybackEngine {
    /// Consume transport events until the channel closes
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                engine.handle_transport_event(event).await;
            }
            debug!("Transport event channel closed");
        })
    }

    /// Watch the event bus for catalog refreshes until `cancel` fires
    pub fn spawn_refresh_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.events().subscribe();
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => event,
                };
                match event {
                    Ok(RadioEvent::CatalogRefreshed { track_count, .. }) => {
                        debug!(track_count, "Catalog refreshed");
                        engine.resume_after_refresh().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Refresh listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Retry playback after the queue ran dry, now that the catalog changed.
    ///
    /// Only acts when the last advance ended in exhaustion and the transport
    /// is still connected. Returns true if playback was restarted.
    pub async fn resume_after_refresh(self: &Arc<Self>) -> bool {
        if !self.session.read().await.queue_exhausted {
            return false;
        }
        if !self.deps.transport.is_connected() {
            debug!("Catalog refreshed while disconnected; not resuming");
            return false;
        }
        info!("Catalog refreshed after queue exhaustion, resuming playback");
        self.play_if_idle().await;
        self.state().await == PlaybackState::Playing
    }

    async fn is_active_stream(&self, stream_id: uuid::Uuid) -> bool {
        self.session.read().await.active_stream == Some(stream_id)
    }

    pub async fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Playing { stream_id } => {
                if self.is_active_stream(stream_id).await {
                    self.session.write().await.retry_count = 0;
                }
            }
            TransportEvent::Paused { stream_id } => {
                debug!(stream = %stream_id, "Transport paused");
            }
            TransportEvent::Idle { stream_id } => {
                let _guard = self.op_lock.lock().await;
                if !self.is_active_stream(stream_id).await {
                    debug!(stream = %stream_id, "Ignoring end of inactive stream");
                    return;
                }
                debug!(stream = %stream_id, "Track finished");
                let token = self.current_token().await;
                self.halt_stream().await;
                self.advance(Advance::Next, token).await;
            }
            TransportEvent::Error { stream_id, message } => {
                let _guard = self.op_lock.lock().await;
                if !self.is_active_stream(stream_id).await {
                    debug!(stream = %stream_id, "Ignoring error from inactive stream");
                    return;
                }
                let token = self.current_token().await;
                self.schedule_recovery(format!("transport error: {}", message), Advance::Next, token)
                    .await;
            }
            TransportEvent::Disconnected => self.handle_disconnect().await,
        }
    }

    /// Count a failure and schedule the next attempt.
    ///
    /// Below `max_retries`, waits `retry_delay` and runs `on_retry`. Once
    /// exhausted, resets the counter, waits the cooldown and moves on to the
    /// next track. Caller must hold `op_lock`.
    pub(super) async fn schedule_recovery(
        self: &Arc<Self>,
        reason: String,
        on_retry: Advance,
        token: CancellationToken,
    ) {
        self.halt_stream().await;

        let max = self.config.max_retries;
        let (attempt, delay, next) = {
            let mut session = self.session.write().await;
            if session.retry_count < max {
                session.retry_count += 1;
                (session.retry_count, self.config.retry_delay, on_retry)
            } else {
                session.retry_count = 0;
                (0, self.config.cooldown, Advance::Next)
            }
        };

        if attempt > 0 {
            warn!(attempt, max, "Playback failed, retrying in {:?}: {}", delay, reason);
        } else {
            error!("Retries exhausted, cooling down for {:?}: {}", delay, reason);
        }

        self.emit(RadioEvent::PipelineError {
            reason,
            timestamp: chrono::Utc::now(),
        });
        self.set_state(PlaybackState::Retrying).await;

        tokio::spawn(Arc::clone(self).advance_after(delay, next, token));
    }

    /// Wait `delay` (cancellable), then advance under `op_lock`
    fn advance_after(
        self: Arc<Self>,
        delay: Duration,
        mode: Advance,
        token: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Pending retry cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            let _guard = self.op_lock.lock().await;
            if token.is_cancelled() {
                return;
            }
            self.advance(mode, token).await;
        }
        .boxed()
    }

    async fn handle_disconnect(self: &Arc<Self>) {
        if self.state().await == PlaybackState::Stopped {
            return;
        }
        if self
            .deps
            .transport
            .await_reconnect(self.config.reconnect_grace)
            .await
        {
            info!("Voice connection recovered on its own");
            return;
        }

        warn!(
            "Voice connection lost, rejoining in {:?}",
            self.config.retry_delay
        );
        let token = self.interrupt().await;
        self.detach_stream().await;
        {
            let _guard = self.op_lock.lock().await;
            self.halt_stream().await;
            self.deps.transport.disconnect().await;
            self.set_state(PlaybackState::Retrying).await;
        }

        let engine = Arc::clone(self);
        let delay = self.config.retry_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match engine.connect_with_retries(&token).await {
                Ok(()) => {}
                Err(Error::Cancelled) => {
                    debug!("Rejoin cancelled");
                    return;
                }
                Err(e) => {
                    error!("Rejoin failed: {}", e);
                    let _guard = engine.op_lock.lock().await;
                    if !token.is_cancelled() {
                        engine.set_state(PlaybackState::Idle).await;
                    }
                    return;
                }
            }
            let _guard = engine.op_lock.lock().await;
            if token.is_cancelled() {
                return;
            }
            engine.advance(Advance::Replay, token).await;
        });
    }

    /// Connect, retrying up to `max_retries` times `retry_delay` apart.
    ///
    /// Returns `Error::Cancelled` if `token` fires first; a connection that
    /// completes after cancellation is released again.
    async fn connect_with_retries(&self, token: &CancellationToken) -> Result<()> {
        let channel = self.session.read().await.voice_channel_id.clone();
        let max = self.config.max_retries;
        let mut attempt = 0u32;

        loop {
            let connected = tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                connected = self.deps.transport.connect(channel.as_deref()) => Ok(connected),
            };
            let connected = match connected {
                Ok(connected) => connected,
                Err(e) => {
                    self.deps.transport.disconnect().await;
                    return Err(e);
                }
            };
            if token.is_cancelled() {
                self.deps.transport.disconnect().await;
                return Err(Error::Cancelled);
            }

            match connected {
                Ok(()) => break,
                Err(e) if attempt < max => {
                    attempt += 1;
                    warn!(attempt, max, "Voice connect failed: {}", e);
                    self.emit(RadioEvent::Reconnecting {
                        attempt,
                        max_attempts: max,
                        timestamp: chrono::Utc::now(),
                    });
                    tokio::select! {
                        _ = token.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let volume = self.session.read().await.volume_percent;
        self.deps.transport.set_volume(gain(volume)).await;
        info!(channel = channel.as_deref().unwrap_or("default"), "Joined voice");
        Ok(())
    }

    /// Join the voice channel and start playing if nothing is active.
    ///
    /// An empty queue is refilled from the catalog on the way in.
    pub async fn join_and_play(self: &Arc<Self>) -> Result<()> {
        if !self.deps.transport.is_connected() {
            let token = self.current_token().await;
            self.connect_with_retries(&token).await?;
        }

        let _guard = self.op_lock.lock().await;
        let state = self.state().await;
        if !matches!(state, PlaybackState::Idle | PlaybackState::Stopped) {
            debug!(state = %state, "Playback already running, join is a no-op");
            return Ok(());
        }
        let token = self.current_token().await;
        self.advance(Advance::Next, token).await;
        Ok(())
    }

    /// Remember the voice channel to join and persist it
    pub async fn set_voice_channel(&self, channel_id: Option<String>) {
        self.session.write().await.voice_channel_id = channel_id.clone();
        self.persist(crate::store::SettingUpdate::VoiceChannel(channel_id))
            .await;
    }
}
