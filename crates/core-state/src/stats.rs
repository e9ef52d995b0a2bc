//! Per-rule skip statistics.
//!
//! Every suppression bumps the counter of the rule that fired. Two kinds of
//! progress are tracked on top of the counts: the last milestone already
//! reported to the user, and the count at which auto-pause last triggered.
//! Both are reset together with the counts by [`SkipStats::clear`].

use core_detect::{SuppressReason, SuppressRule};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Counts at which a "consider adjusting this threshold" notice is raised.
pub const MILESTONES: [u64; 5] = [3, 10, 25, 50, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub count: u64,
    pub last_language: String,
    pub last_at: Instant,
}

/// Most recent suppression, kept for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSkip {
    pub language: String,
    pub reason: SuppressReason,
    pub at: Instant,
}

/// What the host is told about a suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipNotice {
    pub language: String,
    pub reason: SuppressReason,
    /// Total skips for this rule, including this one.
    pub count: u64,
    /// Set when this skip crossed a milestone not yet reported.
    pub milestone: Option<u64>,
    /// Mirrors `notifications.show_skip_toasts`.
    pub toast: bool,
    /// Set when this skip paused detection.
    pub auto_paused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SkipStats {
    records: BTreeMap<SuppressRule, SkipRecord>,
    reported: HashMap<SuppressRule, u64>,
    auto_paused_at: HashMap<SuppressRule, u64>,
    last: Option<LastSkip>,
}

impl SkipStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one suppression and return the rule's new total.
    pub fn record(&mut self, language: &str, reason: SuppressReason, now: Instant) -> u64 {
        let record = self
            .records
            .entry(reason.rule())
            .or_insert_with(|| SkipRecord {
                count: 0,
                last_language: String::new(),
                last_at: now,
            });
        record.count += 1;
        record.last_language = language.to_string();
        record.last_at = now;
        self.last = Some(LastSkip {
            language: language.to_string(),
            reason,
            at: now,
        });
        record.count
    }

    /// Smallest milestone above the last reported one that the count has
    /// reached. Marks it reported.
    pub fn take_milestone(&mut self, rule: SuppressRule) -> Option<u64> {
        let count = self.count(rule);
        let reported = self.reported.get(&rule).copied().unwrap_or(0);
        let milestone = MILESTONES
            .iter()
            .copied()
            .find(|&m| m > reported && count >= m)?;
        self.reported.insert(rule, milestone);
        Some(milestone)
    }

    /// True once the rule has fired `trigger` more times since it last caused
    /// an auto-pause. Marks the current count as the new baseline.
    pub fn take_auto_pause(&mut self, rule: SuppressRule, trigger: u64) -> bool {
        if trigger == 0 {
            return false;
        }
        let count = self.count(rule);
        let baseline = self.auto_paused_at.get(&rule).copied().unwrap_or(0);
        if count.saturating_sub(baseline) < trigger {
            return false;
        }
        self.auto_paused_at.insert(rule, count);
        true
    }

    pub fn count(&self, rule: SuppressRule) -> u64 {
        self.records.get(&rule).map_or(0, |r| r.count)
    }

    pub fn get(&self, rule: SuppressRule) -> Option<&SkipRecord> {
        self.records.get(&rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SuppressRule, &SkipRecord)> {
        self.records.iter().map(|(rule, rec)| (*rule, rec))
    }

    pub fn total(&self) -> u64 {
        self.records.values().map(|r| r.count).sum()
    }

    /// Rule with the highest count; ties go to the earlier rule.
    pub fn top(&self) -> Option<(SuppressRule, &SkipRecord)> {
        self.iter()
            .max_by(|a, b| a.1.count.cmp(&b.1.count).then(b.0.cmp(&a.0)))
    }

    pub fn last(&self) -> Option<&LastSkip> {
        self.last.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
