//! Property tests for threshold disablement and the count rule.

use core_config::{BulkDetectionConfig, ThresholdKey};
use core_detect::{ChangeTracker, SuppressRule, detect};
use core_text::{Edit, Position, TextRange};
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn edit_strategy() -> impl Strategy<Value = Edit> {
    (0usize..80, 0usize..4, 0usize..60, "[a-z\n（。]{0,120}").prop_map(
        |(line, character, span, text)| {
            let range = TextRange::new(
                Position::new(line, character),
                Position::new(line + span, character),
            );
            Edit::new(range, 0, 0, text)
        },
    )
}

fn batches() -> impl Strategy<Value = Vec<(u64, Vec<Edit>)>> {
    prop::collection::vec(
        (0u64..120, prop::collection::vec(edit_strategy(), 0..30)),
        1..25,
    )
}

fn config_strategy() -> impl Strategy<Value = BulkDetectionConfig> {
    prop::array::uniform7(0u64..3000).prop_map(|v| BulkDetectionConfig {
        max_changes: v[0],
        max_chars_per_change: v[1],
        max_lines_per_change: v[2],
        max_recent_size: v[3],
        min_full_replace_lines: v[4],
        high_frequency_interval: v[5],
        high_frequency_changes: v[6],
    })
}

/// Zero every threshold that feeds `rule`.
fn disable(cfg: &mut BulkDetectionConfig, rule: SuppressRule) {
    cfg.set(rule.threshold_key(), 0);
    if rule == SuppressRule::HighFrequency {
        cfg.set(ThresholdKey::HighFrequencyInterval, 0);
    }
}

proptest! {
    #[test]
    fn fully_disabled_config_never_suppresses(steps in batches()) {
        let cfg = BulkDetectionConfig::disabled();
        let mut tracker = ChangeTracker::new();
        let mut now = Instant::now();
        for (gap, batch) in steps {
            now += Duration::from_millis(gap);
            prop_assert_eq!(detect(&batch, &mut tracker, &cfg, now), None);
        }
    }

    #[test]
    fn disabled_rule_is_never_reported(
        rule_idx in 0usize..6,
        cfg in config_strategy(),
        steps in batches()
    ) {
        let rule = SuppressRule::ALL[rule_idx];
        let mut cfg = cfg;
        disable(&mut cfg, rule);
        let mut tracker = ChangeTracker::new();
        let mut now = Instant::now();
        for (gap, batch) in steps {
            now += Duration::from_millis(gap);
            if let Some(reason) = detect(&batch, &mut tracker, &cfg, now) {
                prop_assert_ne!(reason.rule(), rule);
            }
        }
    }

    #[test]
    fn count_rule_fires_iff_batch_exceeds_max(n in 0usize..60, max in 1u64..40) {
        let cfg = BulkDetectionConfig { max_changes: max, ..BulkDetectionConfig::disabled() };
        let batch: Vec<Edit> = (0..n)
            .map(|i| Edit::new(TextRange::caret(Position::new(i, 0)), 0, 0, "x"))
            .collect();
        let reason = detect(&batch, &mut ChangeTracker::new(), &cfg, Instant::now());
        prop_assert_eq!(reason.is_some(), n as u64 > max);
        if let Some(r) = reason {
            prop_assert_eq!(r.rule(), SuppressRule::ChangeCount);
        }
    }
}
