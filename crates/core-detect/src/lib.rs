//! Bulk-edit discriminator.
//!
//! Decides whether an incoming batch of edits looks like one human keystroke
//! (eligible for symbol substitution) or a mechanical change such as a paste,
//! a formatter run or find-and-replace (left untouched).
//!
//! Rules, in reporting order (a threshold of 0 disables its rule):
//! 1. count       – more edits in the batch than `max_changes`
//! 2. size        – first edit inserting more than `max_chars_per_change`
//! 3. span        – first edit whose range crosses more than `max_lines_per_change` lines
//! 4. burst       – characters inserted within the last second exceed `max_recent_size`
//! 5. full replace – an edit at (0,0) whose text has more than `min_full_replace_lines` lines
//! 6. frequency   – more than `high_frequency_changes` batches each arriving within
//!    `high_frequency_interval` ms of the previous one
//!
//! State mutation is total: the recent window (rule 4) and the frequency
//! counter (rule 6) are updated on every call, even when an earlier rule has
//! already decided to suppress. Only the *reported* reason short-circuits.

use core_config::BulkDetectionConfig;
use core_text::Edit;
use std::time::{Duration, Instant};
use tracing::trace;

mod reason;
mod tracker;

pub use reason::{BulkHint, SuppressReason, SuppressRule};
pub use tracker::{ChangeTracker, RECENT_WINDOW};

/// Classify `batch`, updating `tracker` as a side effect.
pub fn detect(
    batch: &[Edit],
    tracker: &mut ChangeTracker,
    config: &BulkDetectionConfig,
    now: Instant,
) -> Option<SuppressReason> {
    let total: usize = batch.iter().map(Edit::char_len).sum();
    tracker.record(now, total);

    let reason = count_rule(batch, config)
        .or_else(|| size_rule(batch, config))
        .or_else(|| span_rule(batch, config))
        .or_else(|| burst_rule(tracker, config))
        .or_else(|| full_replace_rule(batch, config));
    let frequency = frequency_step(tracker, config, now);

    trace!(
        target: "detect",
        edits = batch.len(),
        inserted = total,
        recent = tracker.recent_size(),
        streak = tracker.change_count(),
        suppressed = reason.or(frequency).is_some(),
        "bulk_check"
    );
    reason.or(frequency)
}

fn count_rule(batch: &[Edit], config: &BulkDetectionConfig) -> Option<SuppressReason> {
    let max = config.max_changes;
    (max > 0 && batch.len() as u64 > max).then_some(SuppressReason::ChangeCount {
        count: batch.len(),
        max,
    })
}

fn size_rule(batch: &[Edit], config: &BulkDetectionConfig) -> Option<SuppressReason> {
    let max = config.max_chars_per_change;
    if max == 0 {
        return None;
    }
    batch.iter().find_map(|edit| {
        let size = edit.char_len();
        (size as u64 > max).then_some(SuppressReason::ChangeSize { size, max })
    })
}

fn span_rule(batch: &[Edit], config: &BulkDetectionConfig) -> Option<SuppressReason> {
    let max = config.max_lines_per_change;
    if max == 0 {
        return None;
    }
    batch.iter().find_map(|edit| {
        let span = edit.range.line_span();
        (span as u64 > max).then_some(SuppressReason::LineSpan { span, max })
    })
}

fn burst_rule(tracker: &ChangeTracker, config: &BulkDetectionConfig) -> Option<SuppressReason> {
    let max = config.max_recent_size;
    let total = tracker.recent_size();
    (max > 0 && total as u64 > max).then_some(SuppressReason::RecentSize { total, max })
}

fn full_replace_rule(batch: &[Edit], config: &BulkDetectionConfig) -> Option<SuppressReason> {
    let threshold = config.min_full_replace_lines;
    if threshold == 0 {
        return None;
    }
    let replaces_document = batch.iter().any(|edit| {
        edit.range.start.line == 0
            && edit.range.start.character == 0
            && edit.text.split('\n').count() as u64 > threshold
    });
    replaces_document.then_some(SuppressReason::FullReplace { threshold })
}

/// Rule 6. Always runs and always stamps `last_change_time`.
///
/// Outside the interval (or with the rule disabled) the streak restarts at 1
/// when both thresholds are positive and at 0 otherwise.
fn frequency_step(
    tracker: &mut ChangeTracker,
    config: &BulkDetectionConfig,
    now: Instant,
) -> Option<SuppressReason> {
    let interval = config.high_frequency_interval;
    let max_changes = config.high_frequency_changes;
    let within = interval > 0
        && tracker
            .last_change_time()
            .is_some_and(|last| now.saturating_duration_since(last) < Duration::from_millis(interval));
    let mut reason = None;
    if within {
        let streak = tracker.bump_count();
        if max_changes > 0 && streak > max_changes {
            reason = Some(SuppressReason::HighFrequency {
                max_changes,
                interval_ms: interval,
            });
        }
    } else {
        tracker.set_count(if interval > 0 && max_changes > 0 { 1 } else { 0 });
    }
    tracker.note_change(now);
    reason
}
