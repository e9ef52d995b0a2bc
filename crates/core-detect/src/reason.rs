use core_config::ThresholdKey;
use std::fmt;

/// Which detection rule produced a suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SuppressRule {
    ChangeCount,
    ChangeSize,
    LineSpan,
    RecentSize,
    FullReplace,
    HighFrequency,
}

/// User-facing explanation of a rule and the setting that tunes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkHint {
    pub title: &'static str,
    pub setting_key: &'static str,
    pub suggestion: &'static str,
}

impl SuppressRule {
    pub const ALL: [SuppressRule; 6] = [
        SuppressRule::ChangeCount,
        SuppressRule::ChangeSize,
        SuppressRule::LineSpan,
        SuppressRule::RecentSize,
        SuppressRule::FullReplace,
        SuppressRule::HighFrequency,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            SuppressRule::ChangeCount => "change_count",
            SuppressRule::ChangeSize => "change_size",
            SuppressRule::LineSpan => "line_span",
            SuppressRule::RecentSize => "recent_size",
            SuppressRule::FullReplace => "full_replace",
            SuppressRule::HighFrequency => "high_frequency",
        }
    }

    /// Threshold a user would relax to stop this rule from firing.
    pub const fn threshold_key(self) -> ThresholdKey {
        match self {
            SuppressRule::ChangeCount => ThresholdKey::MaxChanges,
            SuppressRule::ChangeSize => ThresholdKey::MaxCharsPerChange,
            SuppressRule::LineSpan => ThresholdKey::MaxLinesPerChange,
            SuppressRule::RecentSize => ThresholdKey::MaxRecentSize,
            SuppressRule::FullReplace => ThresholdKey::MinFullReplaceLines,
            SuppressRule::HighFrequency => ThresholdKey::HighFrequencyChanges,
        }
    }

    pub const fn hint(self) -> BulkHint {
        match self {
            SuppressRule::ChangeCount => BulkHint {
                title: "Too many edits at once",
                setting_key: "bulk_detection.max_changes",
                suggestion: "Increase max_changes to allow more simultaneous edits before skipping.",
            },
            SuppressRule::ChangeSize => BulkHint {
                title: "Single change too large",
                setting_key: "bulk_detection.max_chars_per_change",
                suggestion: "Raise max_chars_per_change if large paste operations should still convert.",
            },
            SuppressRule::LineSpan => BulkHint {
                title: "Edit spans lots of lines",
                setting_key: "bulk_detection.max_lines_per_change",
                suggestion: "Increase max_lines_per_change to tolerate multi-line replacements.",
            },
            SuppressRule::RecentSize => BulkHint {
                title: "Burst of edits detected",
                setting_key: "bulk_detection.max_recent_size",
                suggestion: "Bump max_recent_size if rapid typing or macros should still run.",
            },
            SuppressRule::FullReplace => BulkHint {
                title: "Looks like full document replace",
                setting_key: "bulk_detection.min_full_replace_lines",
                suggestion: "Lower min_full_replace_lines if whole-file operations should convert.",
            },
            SuppressRule::HighFrequency => BulkHint {
                title: "High-frequency edit storm",
                setting_key: "bulk_detection.high_frequency_changes",
                suggestion: "Increase high_frequency_changes or the interval to avoid throttling fast typing.",
            },
        }
    }
}

/// Why a batch was left untouched. `Display` renders the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressReason {
    ChangeCount { count: usize, max: u64 },
    ChangeSize { size: usize, max: u64 },
    LineSpan { span: usize, max: u64 },
    RecentSize { total: usize, max: u64 },
    FullReplace { threshold: u64 },
    HighFrequency { max_changes: u64, interval_ms: u64 },
}

impl SuppressReason {
    pub const fn rule(&self) -> SuppressRule {
        match self {
            SuppressReason::ChangeCount { .. } => SuppressRule::ChangeCount,
            SuppressReason::ChangeSize { .. } => SuppressRule::ChangeSize,
            SuppressReason::LineSpan { .. } => SuppressRule::LineSpan,
            SuppressReason::RecentSize { .. } => SuppressRule::RecentSize,
            SuppressReason::FullReplace { .. } => SuppressRule::FullReplace,
            SuppressReason::HighFrequency { .. } => SuppressRule::HighFrequency,
        }
    }
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::ChangeCount { count, max } => {
                write!(f, "change count {count} > maxChanges {max}")
            }
            SuppressReason::ChangeSize { size, max } => {
                write!(f, "single change size {size} > maxCharsPerChange {max}")
            }
            SuppressReason::LineSpan { span, max } => {
                write!(f, "line span {span} > maxLinesPerChange {max}")
            }
            SuppressReason::RecentSize { total, max } => {
                write!(f, "recent change size {total} > maxRecentSize {max}")
            }
            SuppressReason::FullReplace { threshold } => {
                write!(
                    f,
                    "change length exceeds full replace threshold {threshold} lines"
                )
            }
            SuppressReason::HighFrequency {
                max_changes,
                interval_ms,
            } => write!(
                f,
                "high-frequency edits exceeded {max_changes} within {interval_ms}ms"
            ),
        }
    }
}
