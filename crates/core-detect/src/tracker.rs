use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples younger than this stay in the recent window.
pub const RECENT_WINDOW: Duration = Duration::from_millis(1000);

/// Timestamp and total inserted characters of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChangeSample {
    pub(crate) time: Instant,
    pub(crate) size: usize,
}

/// Rolling history consulted (and updated) by every detection call.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    last_change_time: Option<Instant>,
    change_count: u64,
    recent: VecDeque<ChangeSample>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_change_time(&self) -> Option<Instant> {
        self.last_change_time
    }

    /// Consecutive batches observed inside the high-frequency interval.
    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    /// Sum of sizes currently in the window.
    pub fn recent_size(&self) -> usize {
        self.recent.iter().map(|s| s.size).sum()
    }

    /// Append a sample and evict everything aged `RECENT_WINDOW` or more.
    pub fn record(&mut self, now: Instant, size: usize) {
        self.recent.push_back(ChangeSample { time: now, size });
        self.recent
            .retain(|s| now.saturating_duration_since(s.time) < RECENT_WINDOW);
    }

    pub(crate) fn note_change(&mut self, now: Instant) {
        self.last_change_time = Some(now);
    }

    pub(crate) fn bump_count(&mut self) -> u64 {
        self.change_count += 1;
        self.change_count
    }

    pub(crate) fn set_count(&mut self, count: u64) {
        self.change_count = count;
    }

    /// Forget all history (deactivation).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
