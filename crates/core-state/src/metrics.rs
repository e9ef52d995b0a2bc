use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Session counters. Atomic so a snapshot can be taken through `&self`.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    batches_seen: AtomicU64,
    batches_ignored: AtomicU64,
    batches_dropped_busy: AtomicU64,
    batches_suppressed: AtomicU64,
    passes_scheduled: AtomicU64,
    passes_replaced: AtomicU64,
    passes_run: AtomicU64,
    pass_failures: AtomicU64,
    replacements_applied: AtomicU64,
    cursor_moves: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionMetricsSnapshot {
    pub batches_seen: u64,
    pub batches_ignored: u64,
    pub batches_dropped_busy: u64,
    pub batches_suppressed: u64,
    pub passes_scheduled: u64,
    /// Pending passes discarded because a newer batch re-armed the debounce.
    pub passes_replaced: u64,
    pub passes_run: u64,
    pub pass_failures: u64,
    pub replacements_applied: u64,
    pub cursor_moves: u64,
}

impl SessionMetrics {
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            batches_seen: self.batches_seen.load(Relaxed),
            batches_ignored: self.batches_ignored.load(Relaxed),
            batches_dropped_busy: self.batches_dropped_busy.load(Relaxed),
            batches_suppressed: self.batches_suppressed.load(Relaxed),
            passes_scheduled: self.passes_scheduled.load(Relaxed),
            passes_replaced: self.passes_replaced.load(Relaxed),
            passes_run: self.passes_run.load(Relaxed),
            pass_failures: self.pass_failures.load(Relaxed),
            replacements_applied: self.replacements_applied.load(Relaxed),
            cursor_moves: self.cursor_moves.load(Relaxed),
        }
    }

    pub(crate) fn incr_seen(&self) {
        self.batches_seen.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_ignored(&self) {
        self.batches_ignored.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_dropped_busy(&self) {
        self.batches_dropped_busy.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_suppressed(&self) {
        self.batches_suppressed.fetch_add(1, Relaxed);
    }
    pub(crate) fn note_scheduled(&self, replaced: bool) {
        self.passes_scheduled.fetch_add(1, Relaxed);
        if replaced {
            self.passes_replaced.fetch_add(1, Relaxed);
        }
    }
    pub(crate) fn note_pass(&self, replacements: usize) {
        self.passes_run.fetch_add(1, Relaxed);
        self.replacements_applied
            .fetch_add(replacements as u64, Relaxed);
    }
    pub(crate) fn incr_pass_failure(&self) {
        self.pass_failures.fetch_add(1, Relaxed);
    }
    pub(crate) fn incr_cursor_move(&self) {
        self.cursor_moves.fetch_add(1, Relaxed);
    }
}
