//! Playback engine scenarios against in-memory collaborators
//!
//! Timing-dependent tests run on a paused clock, so retry delays and
//! cooldowns elapse instantly once the runtime is idle.

mod helpers;

use autoradio_common::events::{PlaybackState, RadioEvent};
use autoradio_player::catalog::{
    fallback_entries, CatalogEntry, CatalogRefresher, CatalogSource, RefreshSettings,
};
use autoradio_player::error::Error;
use autoradio_player::playback::{EngineConfig, EqualizerMode};
use autoradio_player::resolver::SourceResolver;
use autoradio_player::store::{Favorite, GuildSettings, SessionStore};
use autoradio_player::track::Track;
use autoradio_player::transport::{TransportEvent, VoiceTransport};
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Whole seconds; the paused clock may land a tick past a deadline
fn whole_secs(elapsed: Duration) -> u64 {
    elapsed.as_secs()
}

fn config_with_retries(max_retries: u32) -> EngineConfig {
    EngineConfig {
        max_retries,
        ..test_config()
    }
}

// ============================================================================
// Refill and selection
// ============================================================================

#[tokio::test]
async fn test_fallback_refill_resolves_bounded_batch() {
    let h = Harness::new(test_config(), MapResolver::everything());

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.resolver.calls(), 20);
    assert_eq!(h.engine.queue_len().await, 19);
    assert_eq!(
        h.current_title().await.as_deref(),
        Some(fallback_entries()[0].title.as_str())
    );
}

#[tokio::test]
async fn test_fallback_refill_queues_only_resolved_tracks() {
    let fallback = fallback_entries();
    // Index 25 lies beyond the enrichment limit and is never looked up
    let resolver = MapResolver::new()
        .with(&fallback[0].search_query(), source("first"))
        .with(&fallback[5].search_query(), source("sixth"))
        .with(&fallback[25].search_query(), source("late"));
    let h = Harness::new(test_config(), resolver);

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.resolver.calls(), 20);
    assert_eq!(h.current_title().await.as_deref(), Some(fallback[0].title.as_str()));
    let view = h.engine.queue_view(10).await;
    assert_eq!(view.upcoming.len(), 1);
    assert_eq!(view.upcoming[0].title, fallback[5].title);
}

#[tokio::test]
async fn test_refill_prefers_catalog_cache_without_lookups() {
    let h = Harness::new(test_config(), MapResolver::everything());
    h.catalog
        .replace(vec![
            resolved_entry("One", 1, "one"),
            autoradio_player::catalog::CatalogEntry::new("Unresolved", "Artist", 2),
            resolved_entry("Three", 3, "three"),
        ])
        .await;

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.resolver.calls(), 0);
    assert_eq!(h.current_title().await.as_deref(), Some("One"));
    assert_eq!(h.engine.queue_len().await, 1);
}

#[tokio::test]
async fn test_recently_played_tracks_are_skipped() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.store.mark_recent("one");
    h.catalog
        .replace(vec![resolved_entry("One", 1, "one"), resolved_entry("Two", 2, "two")])
        .await;

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.current_title().await.as_deref(), Some("Two"));
    assert_eq!(h.engine.queue_len().await, 0);
}

#[tokio::test]
async fn test_queue_exhausted_goes_idle_and_notifies() {
    let h = Harness::new(test_config(), MapResolver::new());
    let mut rx = h.events.subscribe();

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.engine.state().await, PlaybackState::Idle);
    assert_eq!(h.pipeline.launch_count(), 0);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, RadioEvent::QueueExhausted { .. })));
}

fn refresher_for(h: &Harness, entries: Vec<CatalogEntry>) -> CatalogRefresher {
    let sources: Vec<Arc<dyn CatalogSource>> = vec![Arc::new(StaticSource::new("chart", entries))];
    CatalogRefresher::new(
        sources,
        Arc::clone(&h.resolver) as Arc<dyn SourceResolver>,
        Arc::clone(&h.catalog),
        Arc::clone(&h.store) as Arc<dyn SessionStore>,
        Arc::clone(&h.events),
        RefreshSettings {
            max_songs: 50,
            enrich_pause_every: 0,
            enrich_pause: Duration::ZERO,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_catalog_refresh_restarts_exhausted_queue() {
    let h = Harness::new(
        test_config(),
        MapResolver::new().with("Fresh Artist", source("fresh")),
    );
    let cancel = CancellationToken::new();
    let listener = h.engine.spawn_refresh_listener(cancel.clone());

    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Idle);

    let refresher = refresher_for(&h, vec![CatalogEntry::new("Fresh", "Artist", 0)]);
    assert_eq!(refresher.refresh().await.unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.pipeline.launch_count(), 1);
    assert_eq!(h.current_title().await.as_deref(), Some("Fresh"));

    cancel.cancel();
    listener.await.unwrap();
}

#[tokio::test]
async fn test_refresh_resume_requires_exhaustion_and_connection() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.catalog.replace(vec![resolved_entry("Z", 1, "z")]).await;

    // Never exhausted: nothing to resume
    assert!(!h.engine.resume_after_refresh().await);
    assert_eq!(h.pipeline.launch_count(), 0);

    // Exhausted, then left the channel
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Idle);
    h.transport.disconnect().await;
    h.catalog.replace(vec![resolved_entry("Z", 1, "z")]).await;
    assert!(!h.engine.resume_after_refresh().await);
    assert_eq!(h.pipeline.launch_count(), 0);

    // A stop clears the exhaustion flag
    h.engine.stop().await;
    h.transport.connect(None).await.unwrap();
    assert!(!h.engine.resume_after_refresh().await);
    assert_eq!(h.engine.state().await, PlaybackState::Stopped);
}

#[tokio::test]
async fn test_unresolvable_track_is_skipped() {
    let h = Harness::new(test_config(), MapResolver::new());
    let mut rx = h.events.subscribe();
    h.engine.enqueue(Track::new("Bad", "Song"), false).await;
    h.engine.enqueue(resolved_track("Good", "good"), false).await;

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.current_title().await.as_deref(), Some("Good"));
    assert_eq!(h.store.played_titles(), vec!["Good".to_string()]);
    assert_eq!(h.pipeline.launch_count(), 1);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, RadioEvent::PipelineError { .. })));
}

#[tokio::test]
async fn test_unresolved_track_gets_source_on_dequeue() {
    let track = Track::new("Lazy", "Artist");
    let resolver = MapResolver::new().with(&track.search_query(), source("lazy"));
    let h = Harness::new(test_config(), resolver);
    h.engine.enqueue(track, false).await;

    h.engine.join_and_play().await.unwrap();

    let current = h.engine.current_track().await.unwrap();
    assert_eq!(current.title, "Lazy");
    assert_eq!(current.source_url, Some(source("lazy").url));
    assert_eq!(h.pipeline.launches()[0].url, source("lazy").url);
}

// ============================================================================
// Requests and controls
// ============================================================================

#[tokio::test]
async fn test_request_starts_idle_engine() {
    let mut found = source("flowers");
    found.title = Some("Flowers".to_string());
    found.uploader = Some("Miley Cyrus".to_string());
    let h = Harness::new(test_config(), MapResolver::new().with("flowers", found));
    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Idle);

    let info = h.engine.request("flowers", "alice").await.unwrap();

    assert_eq!(info.title, "Flowers");
    assert_eq!(info.artist, "Miley Cyrus");
    assert!(info.is_manual_request);
    assert_eq!(info.requested_by, "alice");
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.current_title().await.as_deref(), Some("Flowers"));
}

#[tokio::test]
async fn test_request_jumps_ahead_of_auto_tracks() {
    let h = Harness::new(test_config(), MapResolver::new().with("wanted", source("wanted")));
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();

    h.engine.request("wanted", "bob").await.unwrap();

    let view = h.engine.queue_view(10).await;
    assert_eq!(view.current.unwrap().title, "A");
    assert_eq!(view.upcoming[0].title, "wanted");
    assert_eq!(view.upcoming[1].title, "B");
}

#[tokio::test]
async fn test_request_without_results() {
    let h = Harness::new(test_config(), MapResolver::new());

    let result = h.engine.request("nothing here", "bob").await;
    assert!(matches!(result, Err(Error::Resolution(_))));

    let result = h.engine.request("   ", "bob").await;
    assert!(matches!(result, Err(Error::BadRequest(_))));
}

#[tokio::test]
async fn test_request_while_disconnected_only_queues() {
    let h = Harness::new(test_config(), MapResolver::new().with("song", source("song")));

    h.engine.request("song", "bob").await.unwrap();

    assert_eq!(h.engine.state().await, PlaybackState::Idle);
    assert_eq!(h.engine.queue_len().await, 1);
    assert_eq!(h.pipeline.launch_count(), 0);
}

#[tokio::test]
async fn test_track_end_advances_and_stale_end_is_ignored() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.enqueue(resolved_track("C", "c"), false).await;
    h.engine.join_and_play().await.unwrap();
    let first = h.transport.last_stream().unwrap();

    h.engine
        .handle_transport_event(TransportEvent::Idle { stream_id: first })
        .await;
    assert_eq!(h.current_title().await.as_deref(), Some("B"));
    assert_eq!(h.pipeline.launch_count(), 2);

    // A second end-of-stream for the old stream must not skip B
    h.engine
        .handle_transport_event(TransportEvent::Idle { stream_id: first })
        .await;
    assert_eq!(h.current_title().await.as_deref(), Some("B"));
    assert_eq!(h.pipeline.launch_count(), 2);
    assert_eq!(h.store.played_titles(), vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_skip_moves_to_next_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();
    let stops_before = h.transport.stop_count();

    h.engine.skip().await.unwrap();

    assert_eq!(h.current_title().await.as_deref(), Some("B"));
    assert!(h.transport.stop_count() > stops_before);
}

#[tokio::test]
async fn test_skip_requires_connection() {
    let h = Harness::new(test_config(), MapResolver::new());
    assert!(matches!(h.engine.skip().await, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_previous_replays_history_head() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();
    assert!(matches!(h.engine.previous().await, Err(Error::NotFound(_))));

    h.engine.skip().await.unwrap();
    h.engine.previous().await.unwrap();

    let view = h.engine.queue_view(10).await;
    assert_eq!(view.current.unwrap().title, "A");
    assert_eq!(view.upcoming[0].title, "B");
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_elapsed_time() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();

    sleep_secs(10).await;
    h.engine.pause().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Paused);
    sleep_secs(60).await;
    assert_eq!(whole_secs(h.engine.elapsed().await), 10);

    h.engine.resume().await.unwrap();
    sleep_secs(5).await;
    assert_eq!(whole_secs(h.engine.elapsed().await), 15);
    assert!(matches!(h.engine.resume().await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn test_toggle_pause_needs_a_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    assert!(matches!(
        h.engine.toggle_pause().await,
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_volume_is_clamped_applied_and_persisted() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.engine.set_volume(150).await, 100);
    assert!((h.transport.volume() - 1.0).abs() < f32::EPSILON);

    assert_eq!(h.engine.set_volume(30).await, 30);
    assert!((h.transport.volume() - 0.3).abs() < 1e-6);
    assert_eq!(h.store.settings_for("guild-1").unwrap().volume, 30);
}

#[tokio::test]
async fn test_stop_clears_session_and_leaves_voice() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();

    h.engine.stop().await;

    assert_eq!(h.engine.state().await, PlaybackState::Stopped);
    assert_eq!(h.engine.queue_len().await, 0);
    assert!(h.engine.current_track().await.is_none());
    assert!(h.engine.snapshot().await.track.is_none());
    assert!(!h.transport.is_connected());
}

#[tokio::test]
async fn test_rejoin_after_stop_plays_again() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    h.engine.stop().await;

    h.catalog.replace(vec![resolved_entry("Z", 1, "z")]).await;
    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.current_title().await.as_deref(), Some("Z"));
}

// ============================================================================
// Equalizer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_equalizer_change_restarts_current_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    let mut rx = h.events.subscribe();
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();

    sleep_secs(30).await;
    assert_eq!(whole_secs(h.engine.elapsed().await), 30);

    h.engine.set_equalizer(EqualizerMode::Bassboost).await.unwrap();

    let launches = h.pipeline.launches();
    assert_eq!(launches.len(), 2);
    assert_eq!(launches[0].eq, EqualizerMode::Normal);
    assert_eq!(launches[1].eq, EqualizerMode::Bassboost);
    assert_eq!(launches[0].url, launches[1].url);
    assert_eq!(h.current_title().await.as_deref(), Some("A"));
    assert_eq!(whole_secs(h.engine.elapsed().await), 0);
    assert_eq!(h.engine.queue_len().await, 1);
    assert_eq!(
        h.store.settings_for("guild-1").unwrap().eq_mode,
        EqualizerMode::Bassboost
    );
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, RadioEvent::EqualizerChanged { .. })));
}

#[tokio::test]
async fn test_equalizer_same_mode_is_a_no_op() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();

    h.engine.set_equalizer(EqualizerMode::Normal).await.unwrap();

    assert_eq!(h.pipeline.launch_count(), 1);
}

#[tokio::test]
async fn test_equalizer_change_while_idle_only_records_mode() {
    let h = Harness::new(test_config(), MapResolver::new());

    h.engine.set_equalizer(EqualizerMode::Vocal).await.unwrap();

    assert_eq!(h.engine.equalizer().await, EqualizerMode::Vocal);
    assert_eq!(h.pipeline.launch_count(), 0);
}

// ============================================================================
// Failure recovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pipeline_failure_retries_same_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.pipeline.script(&[Outcome::Fail]);
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;

    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Retrying);
    assert_eq!(h.engine.retry_count().await, 1);

    sleep_secs(6).await;

    let launches = h.pipeline.launches();
    assert_eq!(launches.len(), 2);
    assert_eq!(launches[0].url, launches[1].url);
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.current_title().await.as_deref(), Some("A"));
    assert_eq!(h.engine.retry_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_cool_down_then_move_on() {
    let config = config_with_retries(2);
    let h = Harness::new(config, MapResolver::new());
    let mut rx = h.events.subscribe();
    h.pipeline
        .script(&[Outcome::Fail, Outcome::Fail, Outcome::Fail]);
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;

    h.engine.join_and_play().await.unwrap();

    // Two retries 5s apart, then the third failure starts the cooldown
    sleep_secs(11).await;
    assert_eq!(h.pipeline.launch_count(), 3);
    assert_eq!(h.engine.state().await, PlaybackState::Retrying);
    assert_eq!(h.engine.retry_count().await, 0);

    sleep_secs(30).await;
    let urls: Vec<String> = h.pipeline.launches().into_iter().map(|r| r.url).collect();
    assert_eq!(urls.len(), 4);
    assert_eq!(urls[0], urls[2]);
    assert_ne!(urls[2], urls[3]);
    assert_eq!(h.current_title().await.as_deref(), Some("B"));

    let failures = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RadioEvent::PipelineError { .. }))
        .count();
    assert_eq!(failures, 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.pipeline.script(&[Outcome::Fail]);
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.engine.state().await, PlaybackState::Retrying);

    h.engine.stop().await;
    sleep_secs(60).await;

    assert_eq!(h.pipeline.launch_count(), 1);
    assert_eq!(h.engine.state().await, PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_skip_during_backoff_abandons_retry() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.pipeline.script(&[Outcome::Fail]);
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();

    h.engine.skip().await.unwrap();
    assert_eq!(h.current_title().await.as_deref(), Some("B"));

    sleep_secs(10).await;
    assert_eq!(h.pipeline.launch_count(), 2);
    assert_eq!(h.current_title().await.as_deref(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_moves_to_next_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();
    let stream_id = h.transport.last_stream().unwrap();

    h.engine
        .handle_transport_event(TransportEvent::Error {
            stream_id,
            message: "broken pipe".to_string(),
        })
        .await;
    assert_eq!(h.engine.state().await, PlaybackState::Retrying);

    sleep_secs(6).await;
    assert_eq!(h.current_title().await.as_deref(), Some("B"));
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_rejoins_and_replays_track() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    assert_eq!(h.transport.connect_count(), 1);

    h.engine
        .handle_transport_event(TransportEvent::Disconnected)
        .await;
    assert_eq!(h.engine.state().await, PlaybackState::Retrying);

    sleep_secs(6).await;
    assert_eq!(h.transport.connect_count(), 2);
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.current_title().await.as_deref(), Some("A"));
    assert_eq!(h.pipeline.launch_count(), 2);
}

#[tokio::test]
async fn test_self_healing_disconnect_is_ignored() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.transport.set_heals(true);
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();

    h.engine
        .handle_transport_event(TransportEvent::Disconnected)
        .await;

    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.pipeline.launch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_rejoin_backoff_stays_stopped() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    h.transport.fail_connects(3);

    h.engine
        .handle_transport_event(TransportEvent::Disconnected)
        .await;
    // First rejoin attempt fails at 5s; the next one is due at 10s
    sleep_secs(6).await;
    h.engine.stop().await;
    assert_eq!(h.engine.state().await, PlaybackState::Stopped);

    sleep_secs(60).await;
    assert_eq!(h.engine.state().await, PlaybackState::Stopped);
    assert_eq!(h.transport.connect_count(), 2);
    assert!(!h.transport.is_connected_now());
    assert_eq!(h.pipeline.launch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_rejoin_connect_releases_voice() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    h.transport.slow_connects(Duration::from_secs(10));

    h.engine
        .handle_transport_event(TransportEvent::Disconnected)
        .await;
    // Rejoin connect starts at 5s and would finish at 15s
    sleep_secs(7).await;
    assert_eq!(h.transport.connect_count(), 2);
    h.engine.stop().await;

    sleep_secs(60).await;
    assert_eq!(h.engine.state().await, PlaybackState::Stopped);
    assert!(!h.transport.is_connected_now());
    assert_eq!(h.pipeline.launch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_retries_failed_connects() {
    let h = Harness::new(test_config(), MapResolver::new());
    let mut rx = h.events.subscribe();
    h.transport.fail_connects(2);
    h.engine.enqueue(resolved_track("A", "a"), false).await;

    h.engine.join_and_play().await.unwrap();

    assert_eq!(h.transport.connect_count(), 3);
    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    let reconnects = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, RadioEvent::Reconnecting { .. }))
        .count();
    assert_eq!(reconnects, 2);
}

#[tokio::test(start_paused = true)]
async fn test_join_gives_up_after_max_connect_attempts() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.transport.fail_connects(10);

    let result = h.engine.join_and_play().await;

    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(h.transport.connect_count(), 4);
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_initialize_loads_stored_settings() {
    let store = MemoryStore::with_settings(
        "guild-1",
        GuildSettings {
            volume: 70,
            shuffle_mode: true,
            eq_mode: EqualizerMode::Vocal,
            voice_channel_id: Some("voice-9".to_string()),
            text_channel_id: None,
        },
    );
    let h = Harness::with_store(test_config(), MapResolver::new(), store);

    h.engine.initialize().await.unwrap();

    assert_eq!(h.engine.volume().await, 70);
    assert_eq!(h.engine.equalizer().await, EqualizerMode::Vocal);
    assert!(h.engine.snapshot().await.shuffle);
}

#[tokio::test]
async fn test_initialize_writes_defaults_for_new_guild() {
    let h = Harness::new(test_config(), MapResolver::new());

    h.engine.initialize().await.unwrap();

    let stored = h.store.settings_for("guild-1").unwrap();
    assert_eq!(stored.volume, 50);
    assert!(!stored.shuffle_mode);
    assert_eq!(stored.eq_mode, EqualizerMode::Normal);
}

#[tokio::test]
async fn test_toggle_shuffle_persists() {
    let h = Harness::new(test_config(), MapResolver::new());

    assert!(h.engine.toggle_shuffle().await);
    assert!(h.store.settings_for("guild-1").unwrap().shuffle_mode);
    assert!(!h.engine.toggle_shuffle().await);
}

#[tokio::test]
async fn test_stats_count_plays() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.enqueue(resolved_track("B", "b"), false).await;
    h.engine.join_and_play().await.unwrap();
    h.engine.skip().await.unwrap();

    let stats = h.engine.stats().await.unwrap();
    assert_eq!(stats.total_plays, 2);
    assert_eq!(stats.history_length, 1);
    assert_eq!(stats.state, PlaybackState::Playing);
}

// ============================================================================
// Favorites
// ============================================================================

#[tokio::test]
async fn test_add_favorite_needs_a_current_track() {
    let h = Harness::new(test_config(), MapResolver::new());

    let result = h.engine.add_favorite("user-1").await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_add_favorite_saves_current_track_once() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();

    let (track, added) = h.engine.add_favorite("user-1").await.unwrap();
    assert_eq!(track.title, "A");
    assert!(added);
    let (_, added) = h.engine.add_favorite("user-1").await.unwrap();
    assert!(!added);

    let favorites = h.engine.favorites("user-1").await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].source_id, "a");
    assert!(h.engine.favorites("user-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_favorite_by_position() {
    let h = Harness::new(test_config(), MapResolver::new());
    h.engine.enqueue(resolved_track("A", "a"), false).await;
    h.engine.join_and_play().await.unwrap();
    h.engine.add_favorite("user-1").await.unwrap();

    assert!(matches!(
        h.engine.remove_favorite("user-1", 1).await,
        Err(Error::NotFound(_))
    ));
    let removed = h.engine.remove_favorite("user-1", 0).await.unwrap();
    assert_eq!(removed.title, "A");
    assert!(h.engine.favorites("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_play_favorites_queues_batch_and_starts() {
    let h = Harness::new(test_config(), MapResolver::new());
    assert!(matches!(
        h.engine.play_favorites("user-1").await,
        Err(Error::NotFound(_))
    ));

    for (i, id) in ["b", "c"].iter().enumerate() {
        let track = resolved_track(&id.to_uppercase(), id);
        let favorite = Favorite::from_track(&track, i as i64).unwrap();
        h.store.add_favorite("user-1", &favorite).await.unwrap();
    }
    h.transport.connect(None).await.unwrap();

    assert_eq!(h.engine.play_favorites("user-1").await.unwrap(), 2);

    assert_eq!(h.engine.state().await, PlaybackState::Playing);
    assert_eq!(h.pipeline.launch_count(), 1);
    assert_eq!(h.engine.queue_len().await, 1);
    let current = h.engine.current_track().await.unwrap();
    assert_eq!(current.requested_by, "user-1");
    assert!(!current.is_manual_request);
}
