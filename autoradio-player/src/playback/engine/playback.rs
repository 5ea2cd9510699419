//! Playback flow - the advance loop and transport controls
//!
//! **Responsibilities:**
//! - Advance loop: pick a track, resolve it lazily, launch its decode
//!   pipeline, hand the stream to the transport
//! - Skip-and-continue on resolution failures
//! - Pause/resume/skip/previous/stop
//! - Live volume and equalizer changes
//!
//! Every function that changes the active stream runs with `op_lock` held.
//! Interrupting commands cancel the in-flight token first so a pending
//! resolve, launch or backoff gives up the lock promptly.

use super::core::PlaybackEngine;
use crate::error::{Error, Result};
use crate::playback::equalizer::EqualizerMode;
use crate::playback::pipeline::{DecodeOutput, DecodeRequest};
use crate::store::SettingUpdate;
use crate::track::Track;
use crate::transport::TransportError;
use autoradio_common::events::{PlaybackState, RadioEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which track the advance loop should start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Advance {
    /// Dequeue the next track, refilling from the catalog if needed
    Next,
    /// Restart the current track from the beginning
    Replay,
    /// Step back to the most recent history entry
    Previous,
}

/// Volume percent to transport gain
pub(super) fn gain(volume_percent: u8) -> f32 {
    volume_percent as f32 / 100.0
}

impl PlaybackEngine {
    /// Start playing whatever `mode` selects.
    ///
    /// Caller must hold `op_lock`. Resolution failures discard the track and
    /// move on; pipeline and transport failures hand over to the retry
    /// policy. Returns once a track is playing, playback is scheduled for a
    /// retry, the queue is exhausted, or `token` is cancelled.
    pub(super) async fn advance(self: &Arc<Self>, mut mode: Advance, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                return;
            }

            let track = match mode {
                Advance::Next => match self.next_track(&token).await {
                    Ok(track) => track,
                    Err(Error::Cancelled) => return,
                    Err(e) => {
                        warn!("Failed to select next track: {}", e);
                        None
                    }
                },
                Advance::Replay => self.queue.read().await.current().cloned(),
                Advance::Previous => self.queue.write().await.dequeue_previous(),
            };

            let Some(track) = track else {
                if mode == Advance::Next {
                    self.on_queue_exhausted().await;
                    return;
                }
                mode = Advance::Next;
                continue;
            };

            let track = match self.ensure_resolved(track, &token).await {
                Ok(track) => track,
                Err(Error::Cancelled) => return,
                Err(e) => {
                    warn!("Skipping track: {}", e);
                    self.emit(RadioEvent::PipelineError {
                        reason: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    mode = Advance::Next;
                    continue;
                }
            };

            match self.start_track(&track, &token).await {
                Ok(()) => {
                    self.on_track_started(&track).await;
                    return;
                }
                Err(Error::Cancelled) => return,
                Err(Error::Transport(TransportError::NotConnected)) => {
                    warn!("Voice transport not connected, playback idle");
                    self.set_state(PlaybackState::Idle).await;
                    return;
                }
                Err(e @ Error::Transport(_)) => {
                    self.schedule_recovery(e.to_string(), Advance::Next, token).await;
                    return;
                }
                Err(e) => {
                    self.schedule_recovery(e.to_string(), Advance::Replay, token).await;
                    return;
                }
            }
        }
    }

    /// Dequeue the next eligible track, refilling once if the queue runs dry
    async fn next_track(&self, token: &CancellationToken) -> Result<Option<Track>> {
        let recent = match self
            .deps
            .store
            .recently_played(&self.config.guild_id, self.config.recent_window_hours)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                warn!("Recently-played lookup failed, not suppressing: {}", e);
                Default::default()
            }
        };

        if let Some(track) = self.queue.write().await.dequeue_next(|id| recent.contains(id)) {
            return Ok(Some(track));
        }

        let added = self.refill(token).await?;
        if added == 0 {
            return Ok(None);
        }
        Ok(self.queue.write().await.dequeue_next(|id| recent.contains(id)))
    }

    /// Fill in the source of a track that lacks one
    async fn ensure_resolved(&self, mut track: Track, token: &CancellationToken) -> Result<Track> {
        if track.is_resolved() {
            return Ok(track);
        }

        self.set_state(PlaybackState::Resolving).await;
        let query = track.search_query();
        debug!(query = %query, "Resolving source");

        let found = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            found = self.deps.resolver.resolve(&query) => found,
        };

        let source = match found {
            Ok(Some(source)) => source,
            Ok(None) => {
                return Err(Error::Resolution(format!("no source found for '{}'", query)))
            }
            Err(Error::Resolution(msg)) => return Err(Error::Resolution(msg)),
            Err(e) => return Err(Error::Resolution(format!("'{}': {}", query, e))),
        };

        self.queue.write().await.resolve_current(source.clone());
        track.resolve_with(source);
        Ok(track)
    }

    /// Launch the decode pipeline for `track` and hand its stream to the transport
    async fn start_track(&self, track: &Track, token: &CancellationToken) -> Result<()> {
        let url = track
            .source_url()
            .map(str::to_string)
            .ok_or_else(|| Error::Resolution(format!("'{}' has no source", track.title)))?;

        self.set_state(PlaybackState::Loading).await;
        self.halt_stream().await;

        let eq = self.session.read().await.eq;
        debug!(title = %track.title, eq = %eq, "Launching decode pipeline");

        let launched = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            launched = self.deps.pipeline.launch(DecodeRequest { url, eq }) => launched,
        };
        let DecodeOutput { handle, stream } = launched?;

        if token.is_cancelled() {
            handle.terminate().await;
            return Err(Error::Cancelled);
        }

        let stream_id = handle.id();
        let volume = {
            let mut session = self.session.write().await;
            session.active_stream = Some(stream_id);
            session.decode = Some(handle);
            session.volume_percent
        };

        self.deps.transport.set_volume(gain(volume)).await;
        if let Err(e) = self.deps.transport.play(stream).await {
            self.halt_stream().await;
            return Err(e.into());
        }

        {
            let mut session = self.session.write().await;
            session.progress.start(track.duration_secs());
            session.retry_count = 0;
        }
        self.set_state(PlaybackState::Playing).await;

        info!(
            title = %track.title,
            artist = %track.artist,
            stream = %stream_id,
            "Now playing"
        );
        Ok(())
    }

    async fn on_track_started(self: &Arc<Self>, track: &Track) {
        self.session.write().await.queue_exhausted = false;
        if let Err(e) = self
            .deps
            .store
            .record_play(&self.config.guild_id, track)
            .await
        {
            warn!(title = %track.title, "Failed to record play: {}", e);
        }

        self.emit(RadioEvent::TrackStarted {
            track: track.to_info(),
            timestamp: chrono::Utc::now(),
        });

        self.preresolve_next().await;
    }

    /// Resolve the next queued track in the background, if it lacks a source
    async fn preresolve_next(self: &Arc<Self>) {
        let next = {
            let queue = self.queue.read().await;
            queue
                .peek(1)
                .first()
                .filter(|t| !t.is_resolved())
                .map(|t| (t.id.clone(), t.search_query()))
        };
        let Some((id, query)) = next else {
            return;
        };

        let token = self.session_child_token().await;
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let found = tokio::select! {
                _ = token.cancelled() => return,
                found = engine.deps.resolver.resolve(&query) => found,
            };
            match found {
                Ok(Some(source)) => {
                    if engine.queue.write().await.resolve_entry(&id, source) {
                        debug!(query = %query, "Pre-resolved next track");
                    }
                }
                Ok(None) => debug!(query = %query, "Pre-resolution found nothing"),
                Err(e) => debug!(query = %query, "Pre-resolution failed: {}", e),
            }
        });
    }

    async fn on_queue_exhausted(&self) {
        warn!("Queue exhausted: no tracks available after refill");
        {
            let mut session = self.session.write().await;
            session.progress.reset();
            session.queue_exhausted = true;
        }
        self.set_state(PlaybackState::Idle).await;
        self.emit(RadioEvent::QueueExhausted {
            timestamp: chrono::Utc::now(),
        });
    }

    /// Forget the active stream so late transport events for it are ignored
    pub(super) async fn detach_stream(&self) {
        self.session.write().await.active_stream = None;
    }

    /// Stop the transport and terminate the active decode pipeline
    pub(super) async fn halt_stream(&self) {
        let handle = {
            let mut session = self.session.write().await;
            session.active_stream = None;
            session.progress.reset();
            session.decode.take()
        };
        self.deps.transport.stop().await;
        if let Some(handle) = handle {
            handle.terminate().await;
        }
    }

    /// Start playback if nothing is playing
    ///
    /// Used after enqueueing; a no-op while a track is active or loading.
    pub(super) async fn play_if_idle(self: &Arc<Self>) {
        let state = self.state().await;
        if !matches!(state, PlaybackState::Idle | PlaybackState::Stopped) {
            return;
        }
        if !self.deps.transport.is_connected() {
            debug!("Not connected; queued without starting playback");
            return;
        }
        let _guard = self.op_lock.lock().await;
        if !matches!(self.state().await, PlaybackState::Idle | PlaybackState::Stopped) {
            return;
        }
        let token = self.current_token().await;
        self.advance(Advance::Next, token).await;
    }

    /// Start playing the next track (no-op if something is already playing)
    pub async fn play_next(self: &Arc<Self>) -> Result<()> {
        if !self.deps.transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        self.play_if_idle().await;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        if self.state().await != PlaybackState::Playing {
            return Err(Error::InvalidState("nothing is playing".to_string()));
        }
        if !self.deps.transport.pause().await {
            return Err(Error::InvalidState("transport has nothing to pause".to_string()));
        }
        self.session.write().await.progress.pause();
        self.set_state(PlaybackState::Paused).await;
        info!("Playback paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        if self.state().await != PlaybackState::Paused {
            return Err(Error::InvalidState("playback is not paused".to_string()));
        }
        if !self.deps.transport.unpause().await {
            return Err(Error::InvalidState("transport has nothing to resume".to_string()));
        }
        self.session.write().await.progress.resume();
        self.set_state(PlaybackState::Playing).await;
        info!("Playback resumed");
        Ok(())
    }

    /// Pause if playing, resume if paused. Returns the new state.
    pub async fn toggle_pause(&self) -> Result<PlaybackState> {
        match self.state().await {
            PlaybackState::Playing => self.pause().await.map(|_| PlaybackState::Paused),
            PlaybackState::Paused => self.resume().await.map(|_| PlaybackState::Playing),
            other => Err(Error::InvalidState(format!("cannot pause while {}", other))),
        }
    }

    /// Abandon the current track (or pending retry) and play the next one
    pub async fn skip(self: &Arc<Self>) -> Result<()> {
        if !self.deps.transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        let token = self.interrupt().await;
        self.detach_stream().await;

        let _guard = self.op_lock.lock().await;
        info!("Skip requested");
        self.halt_stream().await;
        self.advance(Advance::Next, token).await;
        Ok(())
    }

    /// Replay the most recent history entry; the current track goes back
    /// to the front of the queue
    pub async fn previous(self: &Arc<Self>) -> Result<()> {
        if !self.deps.transport.is_connected() {
            return Err(TransportError::NotConnected.into());
        }
        if self.queue.read().await.history_len() == 0 {
            return Err(Error::NotFound("no previous track".to_string()));
        }
        let token = self.interrupt().await;
        self.detach_stream().await;

        let _guard = self.op_lock.lock().await;
        info!("Previous track requested");
        self.halt_stream().await;
        self.advance(Advance::Previous, token).await;
        Ok(())
    }

    /// Tear the session down: clear the queue, kill the pipeline, leave voice
    pub async fn stop(&self) {
        self.reset_session_token().await;
        self.detach_stream().await;

        let _guard = self.op_lock.lock().await;
        self.halt_stream().await;
        {
            let mut queue = self.queue.write().await;
            queue.clear();
            queue.stop();
        }
        {
            let mut session = self.session.write().await;
            session.retry_count = 0;
            session.queue_exhausted = false;
        }
        self.deps.transport.disconnect().await;
        self.set_state(PlaybackState::Stopped).await;
        self.emit_queue_changed().await;
        info!("Playback stopped");
    }

    /// Clamp to `[0, max_volume]`, apply live and persist. Returns the applied value.
    pub async fn set_volume(&self, percent: u32) -> u8 {
        let volume = percent.min(self.config.max_volume as u32) as u8;
        self.session.write().await.volume_percent = volume;

        if self.deps.transport.is_connected() {
            self.deps.transport.set_volume(gain(volume)).await;
        }
        self.persist(SettingUpdate::Volume(volume)).await;

        info!(volume, "Volume set");
        self.emit(RadioEvent::VolumeChanged {
            volume_percent: volume,
            timestamp: chrono::Utc::now(),
        });
        volume
    }

    /// Switch EQ preset. The filter graph is part of the transcode stage, so
    /// an active track restarts from the beginning with the new preset.
    pub async fn set_equalizer(self: &Arc<Self>, mode: EqualizerMode) -> Result<()> {
        let previous = {
            let mut session = self.session.write().await;
            std::mem::replace(&mut session.eq, mode)
        };
        if previous == mode {
            return Ok(());
        }

        self.persist(SettingUpdate::EqMode(mode)).await;
        self.emit(RadioEvent::EqualizerChanged {
            mode: mode.to_string(),
            timestamp: chrono::Utc::now(),
        });
        info!("Equalizer: {} -> {}", previous, mode);

        if !self.state().await.is_active() {
            return Ok(());
        }

        let token = self.interrupt().await;
        self.detach_stream().await;
        let _guard = self.op_lock.lock().await;
        if token.is_cancelled() {
            return Ok(());
        }
        info!("Restarting current track with {} equalizer", mode);
        self.halt_stream().await;
        self.advance(Advance::Replay, token).await;
        Ok(())
    }
}
