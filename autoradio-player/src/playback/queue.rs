//! Track queue
//!
//! Ordered list of tracks split into a manual-request prefix and an
//! auto-filled suffix, plus the current track and a bounded history.
//!
//! Invariants:
//! - priority inserts land right after the leading run of manual requests
//! - shuffling only permutes auto-filled tracks; the manual prefix keeps its order
//! - `current` is `None` only when freshly constructed or stopped
//!
//! The queue holds no store handle. Recently-played lookups come in as a
//! predicate, and shuffle persistence is done by the engine.

use crate::track::{ResolvedSource, Track};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::debug;

/// Maximum number of previously-current tracks kept
pub const HISTORY_CAPACITY: usize = 50;

pub struct Queue {
    entries: VecDeque<Track>,
    current: Option<Track>,
    /// Most recent first
    history: VecDeque<Track>,
    shuffle_mode: bool,
    rng: StdRng,
    last_stamp_ms: i64,
}

impl Queue {
    pub fn new(shuffle_mode: bool) -> Self {
        Self::with_rng(shuffle_mode, StdRng::from_entropy())
    }

    /// Deterministic shuffles for tests
    pub fn with_seed(shuffle_mode: bool, seed: u64) -> Self {
        Self::with_rng(shuffle_mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(shuffle_mode: bool, rng: StdRng) -> Self {
        Self {
            entries: VecDeque::new(),
            current: None,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            shuffle_mode,
            rng,
            last_stamp_ms: 0,
        }
    }

    /// Insertion time, strictly increasing within this queue so ids stay distinct
    fn next_stamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_stamp_ms = now.max(self.last_stamp_ms + 1);
        self.last_stamp_ms
    }

    /// Number of manual requests at the front of the queue
    fn manual_prefix_len(&self) -> usize {
        self.entries
            .iter()
            .take_while(|t| t.is_manual_request)
            .count()
    }

    /// Add a track. Priority tracks are marked as manual requests and go
    /// after the existing manual prefix; others are appended.
    ///
    /// Returns the id assigned to the track.
    pub fn enqueue(&mut self, mut track: Track, priority: bool) -> String {
        let stamp = self.next_stamp();
        track.stamp(priority, stamp);
        let id = track.id.clone();

        if priority {
            let index = self.manual_prefix_len();
            self.entries.insert(index, track);
        } else {
            self.entries.push_back(track);
        }
        id
    }

    /// Append tracks as non-priority, optionally shuffled first
    pub fn enqueue_batch(&mut self, mut tracks: Vec<Track>, shuffle_before_insert: bool) {
        if shuffle_before_insert {
            fisher_yates(&mut tracks, &mut self.rng);
        }
        for track in tracks {
            self.enqueue(track, false);
        }
    }

    /// Pop tracks until one is a manual request or was not played recently.
    ///
    /// Skipped tracks are discarded. Tracks without a source id cannot be
    /// checked and are never skipped. The previous current track moves to
    /// history.
    pub fn dequeue_next<F>(&mut self, mut is_recently_played: F) -> Option<Track>
    where
        F: FnMut(&str) -> bool,
    {
        while let Some(track) = self.entries.pop_front() {
            if !track.is_manual_request {
                if let Some(source_id) = track.source_id() {
                    if is_recently_played(source_id) {
                        debug!(title = %track.title, "Skipping recently played track");
                        continue;
                    }
                }
            }

            if let Some(previous) = self.current.take() {
                self.push_history(previous);
            }
            self.current = Some(track.clone());
            return Some(track);
        }
        None
    }

    /// Step back: current goes to the queue front, history head becomes current
    pub fn dequeue_previous(&mut self) -> Option<Track> {
        let previous = self.history.pop_front()?;
        if let Some(current) = self.current.take() {
            self.entries.push_front(current);
        }
        self.current = Some(previous.clone());
        Some(previous)
    }

    fn push_history(&mut self, track: Track) {
        self.history.push_front(track);
        self.history.truncate(HISTORY_CAPACITY);
    }

    /// Flip shuffle mode; turning it on reshuffles the auto-filled tracks
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle_mode = !self.shuffle_mode;
        if self.shuffle_mode {
            self.shuffle_auto_tracks();
        }
        self.shuffle_mode
    }

    /// Set the mode without reordering (used when loading stored settings)
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle_mode = enabled;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_mode
    }

    /// Permute the auto-filled tracks, manual requests first in original order
    fn shuffle_auto_tracks(&mut self) {
        let (manual, mut auto): (Vec<Track>, Vec<Track>) =
            self.entries.drain(..).partition(|t| t.is_manual_request);
        fisher_yates(&mut auto, &mut self.rng);
        self.entries.extend(manual);
        self.entries.extend(auto);
    }

    /// Remove the track at `index` in the live queue
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.entries.remove(index)
    }

    /// Empty the live queue; current track and history are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Empty the live queue and drop the current track
    pub fn stop(&mut self) {
        self.entries.clear();
        self.current = None;
    }

    /// Fill the source of a queued track if it is still unresolved
    pub fn resolve_entry(&mut self, id: &str, source: ResolvedSource) -> bool {
        self.entries
            .iter_mut()
            .find(|t| t.id == id)
            .map(|t| t.resolve_with(source))
            .unwrap_or(false)
    }

    /// Fill the source of the current track if it is still unresolved
    pub fn resolve_current(&mut self, source: ResolvedSource) -> bool {
        self.current
            .as_mut()
            .map(|t| t.resolve_with(source))
            .unwrap_or(false)
    }

    pub fn peek(&self, count: usize) -> Vec<&Track> {
        self.entries.iter().take(count).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of known durations in the live queue
    pub fn total_duration_secs(&self) -> u64 {
        self.entries.iter().map(Track::duration_secs).sum()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &Track> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Uniform in-place permutation
fn fisher_yates<T>(items: &mut [T], rng: &mut StdRng) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
