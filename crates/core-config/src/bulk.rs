//! Bulk-detection thresholds and their override layering.
//!
//! A threshold of 0 disables its rule. Values are read leniently, one field at
//! a time: integers clamp at 0, finite floats are floored, anything else is
//! treated as absent so a single malformed entry never discards its siblings.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Identifies one of the seven detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKey {
    MaxChanges,
    MaxCharsPerChange,
    MaxLinesPerChange,
    MaxRecentSize,
    MinFullReplaceLines,
    HighFrequencyInterval,
    HighFrequencyChanges,
}

impl ThresholdKey {
    pub const ALL: [ThresholdKey; 7] = [
        ThresholdKey::MaxChanges,
        ThresholdKey::MaxCharsPerChange,
        ThresholdKey::MaxLinesPerChange,
        ThresholdKey::MaxRecentSize,
        ThresholdKey::MinFullReplaceLines,
        ThresholdKey::HighFrequencyInterval,
        ThresholdKey::HighFrequencyChanges,
    ];

    /// Key as written in `symconv.toml`.
    pub const fn name(self) -> &'static str {
        match self {
            ThresholdKey::MaxChanges => "max_changes",
            ThresholdKey::MaxCharsPerChange => "max_chars_per_change",
            ThresholdKey::MaxLinesPerChange => "max_lines_per_change",
            ThresholdKey::MaxRecentSize => "max_recent_size",
            ThresholdKey::MinFullReplaceLines => "min_full_replace_lines",
            ThresholdKey::HighFrequencyInterval => "high_frequency_interval",
            ThresholdKey::HighFrequencyChanges => "high_frequency_changes",
        }
    }

    /// Editor-settings spelling, accepted as an alias.
    pub const fn camel_name(self) -> &'static str {
        match self {
            ThresholdKey::MaxChanges => "maxChanges",
            ThresholdKey::MaxCharsPerChange => "maxCharsPerChange",
            ThresholdKey::MaxLinesPerChange => "maxLinesPerChange",
            ThresholdKey::MaxRecentSize => "maxRecentSize",
            ThresholdKey::MinFullReplaceLines => "minFullReplaceLines",
            ThresholdKey::HighFrequencyInterval => "highFrequencyInterval",
            ThresholdKey::HighFrequencyChanges => "highFrequencyChanges",
        }
    }
}

/// Fully resolved thresholds for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkDetectionConfig {
    pub max_changes: u64,
    pub max_chars_per_change: u64,
    pub max_lines_per_change: u64,
    pub max_recent_size: u64,
    pub min_full_replace_lines: u64,
    /// Milliseconds.
    pub high_frequency_interval: u64,
    pub high_frequency_changes: u64,
}

impl Default for BulkDetectionConfig {
    fn default() -> Self {
        Self {
            max_changes: 20,
            max_chars_per_change: 1000,
            max_lines_per_change: 20,
            max_recent_size: 2000,
            min_full_replace_lines: 50,
            high_frequency_interval: 50,
            high_frequency_changes: 10,
        }
    }
}

impl BulkDetectionConfig {
    /// Every rule switched off.
    pub const fn disabled() -> Self {
        Self {
            max_changes: 0,
            max_chars_per_change: 0,
            max_lines_per_change: 0,
            max_recent_size: 0,
            min_full_replace_lines: 0,
            high_frequency_interval: 0,
            high_frequency_changes: 0,
        }
    }

    pub fn get(&self, key: ThresholdKey) -> u64 {
        match key {
            ThresholdKey::MaxChanges => self.max_changes,
            ThresholdKey::MaxCharsPerChange => self.max_chars_per_change,
            ThresholdKey::MaxLinesPerChange => self.max_lines_per_change,
            ThresholdKey::MaxRecentSize => self.max_recent_size,
            ThresholdKey::MinFullReplaceLines => self.min_full_replace_lines,
            ThresholdKey::HighFrequencyInterval => self.high_frequency_interval,
            ThresholdKey::HighFrequencyChanges => self.high_frequency_changes,
        }
    }

    pub fn set(&mut self, key: ThresholdKey, value: u64) {
        let slot = match key {
            ThresholdKey::MaxChanges => &mut self.max_changes,
            ThresholdKey::MaxCharsPerChange => &mut self.max_chars_per_change,
            ThresholdKey::MaxLinesPerChange => &mut self.max_lines_per_change,
            ThresholdKey::MaxRecentSize => &mut self.max_recent_size,
            ThresholdKey::MinFullReplaceLines => &mut self.min_full_replace_lines,
            ThresholdKey::HighFrequencyInterval => &mut self.high_frequency_interval,
            ThresholdKey::HighFrequencyChanges => &mut self.high_frequency_changes,
        };
        *slot = value;
    }

    /// Field-wise merge: present override fields win, absent ones inherit.
    pub fn merged(mut self, overrides: &BulkDetectionOverride) -> Self {
        for key in ThresholdKey::ALL {
            if let Some(value) = overrides.get(key) {
                self.set(key, value);
            }
        }
        self
    }
}

/// Partial thresholds: the global `[bulk_detection]` section and each
/// `[bulk_detection_overrides.<language>]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkDetectionOverride {
    pub max_changes: Option<u64>,
    pub max_chars_per_change: Option<u64>,
    pub max_lines_per_change: Option<u64>,
    pub max_recent_size: Option<u64>,
    pub min_full_replace_lines: Option<u64>,
    pub high_frequency_interval: Option<u64>,
    pub high_frequency_changes: Option<u64>,
}

impl BulkDetectionOverride {
    pub fn get(&self, key: ThresholdKey) -> Option<u64> {
        match key {
            ThresholdKey::MaxChanges => self.max_changes,
            ThresholdKey::MaxCharsPerChange => self.max_chars_per_change,
            ThresholdKey::MaxLinesPerChange => self.max_lines_per_change,
            ThresholdKey::MaxRecentSize => self.max_recent_size,
            ThresholdKey::MinFullReplaceLines => self.min_full_replace_lines,
            ThresholdKey::HighFrequencyInterval => self.high_frequency_interval,
            ThresholdKey::HighFrequencyChanges => self.high_frequency_changes,
        }
    }

    pub fn set(&mut self, key: ThresholdKey, value: Option<u64>) {
        let slot = match key {
            ThresholdKey::MaxChanges => &mut self.max_changes,
            ThresholdKey::MaxCharsPerChange => &mut self.max_chars_per_change,
            ThresholdKey::MaxLinesPerChange => &mut self.max_lines_per_change,
            ThresholdKey::MaxRecentSize => &mut self.max_recent_size,
            ThresholdKey::MinFullReplaceLines => &mut self.min_full_replace_lines,
            ThresholdKey::HighFrequencyInterval => &mut self.high_frequency_interval,
            ThresholdKey::HighFrequencyChanges => &mut self.high_frequency_changes,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        ThresholdKey::ALL.iter().all(|k| self.get(*k).is_none())
    }

    /// Read whatever well-formed thresholds `value` carries. Non-tables yield
    /// an empty override.
    pub fn from_value(value: &toml::Value) -> Self {
        let mut out = Self::default();
        let Some(table) = value.as_table() else {
            return out;
        };
        for key in ThresholdKey::ALL {
            let raw = table.get(key.name()).or_else(|| table.get(key.camel_name()));
            if let Some(raw) = raw {
                match threshold_from_value(raw) {
                    Some(parsed) => out.set(key, Some(parsed)),
                    None => warn!(
                        target: "config",
                        key = key.name(),
                        kind = raw.type_str(),
                        "threshold_ignored"
                    ),
                }
            }
        }
        out
    }
}

fn threshold_from_value(value: &toml::Value) -> Option<u64> {
    match value {
        toml::Value::Integer(n) => Some((*n).max(0) as u64),
        toml::Value::Float(f) if f.is_finite() => Some(if *f <= 0.0 { 0 } else { f.floor() as u64 }),
        _ => None,
    }
}

pub(crate) fn lenient_override<'de, D>(deserializer: D) -> Result<BulkDetectionOverride, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    Ok(BulkDetectionOverride::from_value(&value))
}

pub(crate) fn lenient_overrides<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, BulkDetectionOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    let mut out = IndexMap::new();
    if let toml::Value::Table(table) = value {
        for (language, entry) in table {
            if entry.is_table() {
                out.insert(language, BulkDetectionOverride::from_value(&entry));
            } else {
                warn!(target: "config", language = language.as_str(), "override_not_a_table");
            }
        }
    }
    Ok(out)
}
