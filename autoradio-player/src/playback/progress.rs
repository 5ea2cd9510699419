//! Playback progress tracking
//!
//! Elapsed time counts wall-clock *playing* time only: time spent paused is
//! accumulated separately and subtracted. All operations are total; calling
//! `pause` twice or `resume` without a pause is a no-op.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    duration: Duration,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset accounting and start counting from zero
    pub fn start(&mut self, duration_secs: u64) {
        self.started_at = Some(Instant::now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.duration = Duration::from_secs(duration_secs);
    }

    /// Forget the current track
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn pause(&mut self) {
        if self.started_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Playing time since `start`, frozen while paused
    pub fn elapsed(&self) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        let now = self.paused_at.unwrap_or_else(Instant::now);
        now.saturating_duration_since(started_at)
            .saturating_sub(self.paused_total)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    pub fn is_finished(&self) -> bool {
        self.started_at.is_some() && self.elapsed() >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_zero_after_start() {
        let mut tracker = ProgressTracker::new();
        tracker.start(120);
        assert_eq!(tracker.elapsed(), Duration::ZERO);
        assert_eq!(tracker.duration_secs(), 120);
        assert!(!tracker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_gap_excluded() {
        let mut tracker = ProgressTracker::new();
        tracker.start(120);

        time::advance(Duration::from_secs(10)).await;
        tracker.pause();
        time::advance(Duration::from_secs(5)).await;
        // Frozen while paused
        assert_eq!(tracker.elapsed_secs(), 10);
        tracker.resume();
        time::advance(Duration::from_secs(3)).await;

        // (T - start) - paused = 18 - 5
        assert_eq!(tracker.elapsed(), Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_pause_and_resume_are_idempotent() {
        let mut tracker = ProgressTracker::new();
        tracker.start(60);
        tracker.resume();

        time::advance(Duration::from_secs(2)).await;
        tracker.pause();
        time::advance(Duration::from_secs(2)).await;
        tracker.pause();
        time::advance(Duration::from_secs(2)).await;
        tracker.resume();
        tracker.resume();

        assert_eq!(tracker.elapsed(), Duration::from_secs(2));
        assert!(!tracker.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_after_duration() {
        let mut tracker = ProgressTracker::new();
        tracker.start(30);
        time::advance(Duration::from_secs(31)).await;
        assert!(tracker.is_finished());

        // Restart resets accounting
        tracker.start(30);
        assert_eq!(tracker.elapsed(), Duration::ZERO);
        assert!(!tracker.is_finished());
    }

    #[test]
    fn test_unstarted_tracker() {
        let mut tracker = ProgressTracker::new();
        tracker.pause();
        assert!(!tracker.is_paused());
        assert_eq!(tracker.elapsed(), Duration::ZERO);
        assert!(!tracker.is_finished());
        tracker.reset();
        assert_eq!(tracker.duration_secs(), 0);
    }
}
