//! Session state: the single owner of everything that lives for one activation.
//!
//! A [`Session`] receives host notifications one at a time and drives the rest
//! of the workspace:
//!
//! ```text
//! TextChanged ─▶ gate/history/enable/exclusion checks ─▶ detect ─▶ debounce slot
//!                                                                      │ poll
//!                                                                      ▼
//!          MutationSettled ◀─ host.apply_edits ◀─ resolve ◀─ gate entered
//!                 │
//!                 ▼
//!        post-mutation queue drained (cursor moves)
//! ```
//!
//! Time is always passed in by the caller (`now: Instant`), so the session
//! never reads the clock itself and every timing rule is testable with
//! synthetic instants.
//!
//! Gate lifecycle:
//! - `poll` enters the gate before resolving. An empty resolution or a failed
//!   host write releases it immediately through the guard's `Drop`.
//! - A successful write keeps the gate in flight until `settle` (the host's
//!   `MutationSettled`) or until `SETTLE_TIMEOUT` passes without one.
//! - Any text change observed while the gate is held is dropped, not queued.

use core_config::{Config, ThresholdKey};
use core_detect::{ChangeTracker, SuppressReason, SuppressRule, detect};
use core_events::{SelectionChange, SelectionKind, TextChange};
use core_mapping::{MappingTable, PairMap};
use core_resolve::{PendingSelection, ResolveInput, resolve};
use core_text::{Position, Replacement, TextError, TextView};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

mod debounce;
mod gate;
mod metrics;
mod pause;
mod stats;

pub use debounce::{DEBOUNCE_DELAY, DebounceSlot, PendingPass};
pub use gate::{GateGuard, GateState, ProcessingGate};
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use pause::{PauseState, Remaining, format_remaining};
pub use stats::{LastSkip, MILESTONES, SkipNotice, SkipRecord, SkipStats};

/// How long a write may stay unsettled before the gate is forced open.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Multiplier applied by [`Session::relax_threshold`].
pub const RELAX_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),
    #[error("edit rejected: {0}")]
    EditRejected(#[from] TextError),
    #[error("host disconnected")]
    Disconnected,
}

/// Editor-side collaborator. The session reads the live buffer through the
/// [`TextView`] supertrait and performs every side effect through this trait.
pub trait EditorHost: TextView {
    fn read_clipboard(&mut self) -> Result<String, HostError>;
    /// Apply all replacements as one transaction.
    fn apply_edits(&mut self, replacements: &[Replacement]) -> Result<(), HostError>;
    fn set_cursor(&mut self, position: Position) -> Result<(), HostError>;
    /// A batch was suppressed. Default: nothing beyond the session's own log line.
    fn notify_skip(&mut self, _notice: &SkipNotice) {}
}

/// Why a text change was not considered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreCause {
    /// A resolver pass or its write is still in progress.
    Busy,
    History,
    Disabled,
    Excluded,
    /// Every edit in the batch was whitespace-only.
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Ignored(IgnoreCause),
    Suppressed(SuppressReason),
    /// A resolver pass is pending; `replaced` is set when it displaced one.
    Scheduled { replaced: bool },
}

/// Result of one resolver pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassReport {
    pub edits: usize,
    pub replacements: usize,
    pub cursor_queued: bool,
}

/// Deferred action run once the host reports the mutation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostMutation {
    MoveCursor(Position),
}

#[derive(Debug)]
pub struct Session {
    config: Config,
    table: MappingTable,
    pairs: PairMap,
    tracker: ChangeTracker,
    selection: Option<PendingSelection>,
    debounce: DebounceSlot,
    gate: ProcessingGate,
    post_mutation: VecDeque<PostMutation>,
    pause: PauseState,
    stats: SkipStats,
    metrics: SessionMetrics,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            table: MappingTable::from_config(&config),
            pairs: PairMap::from_config(&config),
            config,
            tracker: ChangeTracker::new(),
            selection: None,
            debounce: DebounceSlot::default(),
            gate: ProcessingGate::new(),
            post_mutation: VecDeque::new(),
            pause: PauseState::Running,
            stats: SkipStats::new(),
            metrics: SessionMetrics::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.file.enabled
    }

    /// Turn conversion on or off for the rest of the activation.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.file.enabled != enabled {
            info!(target: "session", enabled, "conversion_toggled");
        }
        self.config.file.enabled = enabled;
        if !enabled {
            self.debounce.cancel();
        }
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn pending_selection(&self) -> Option<&PendingSelection> {
        self.selection.as_ref()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// When the pending resolver pass becomes due, if one is armed.
    pub fn next_due(&self) -> Option<Instant> {
        self.debounce.due_at()
    }

    pub fn post_mutation_len(&self) -> usize {
        self.post_mutation.len()
    }

    pub fn stats(&self) -> &SkipStats {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats.clear();
        info!(target: "session", "skip_stats_cleared");
    }

    pub fn metrics(&self) -> SessionMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Handle one edit-batch notification.
    pub fn on_text_change<H: EditorHost>(
        &mut self,
        change: &TextChange,
        now: Instant,
        host: &mut H,
    ) -> ChangeOutcome {
        self.metrics.incr_seen();
        if self.gate.is_held() {
            self.metrics.incr_dropped_busy();
            trace!(target: "session.gate", edits = change.edits.len(), "change_dropped_busy");
            return ChangeOutcome::Ignored(IgnoreCause::Busy);
        }
        let cause = if change.reason.is_history() {
            Some(IgnoreCause::History)
        } else if !self.config.file.enabled {
            Some(IgnoreCause::Disabled)
        } else if self.config.is_excluded(&change.language) {
            Some(IgnoreCause::Excluded)
        } else {
            None
        };
        if let Some(cause) = cause {
            self.metrics.incr_ignored();
            trace!(target: "session", ?cause, "change_ignored");
            return ChangeOutcome::Ignored(cause);
        }

        if !self.pause.is_paused(now) {
            let thresholds = self.config.bulk_detection_for(&change.language);
            if let Some(reason) = detect(&change.edits, &mut self.tracker, &thresholds, now) {
                self.on_suppressed(&change.language, reason, now, host);
                return ChangeOutcome::Suppressed(reason);
            }
        }

        let edits: Vec<_> = change
            .edits
            .iter()
            .filter(|e| !e.text.trim().is_empty())
            .cloned()
            .collect();
        if edits.is_empty() {
            self.metrics.incr_ignored();
            return ChangeOutcome::Ignored(IgnoreCause::Blank);
        }
        let replaced = self.debounce.arm(&change.language, edits, now);
        self.metrics.note_scheduled(replaced);
        trace!(target: "session", language = %change.language, replaced, "pass_scheduled");
        ChangeOutcome::Scheduled { replaced }
    }

    fn on_suppressed<H: EditorHost>(
        &mut self,
        language: &str,
        reason: SuppressReason,
        now: Instant,
        host: &mut H,
    ) {
        self.metrics.incr_suppressed();
        info!(target: "session", language, reason = %reason, "bulk_suppressed");
        let rule = reason.rule();
        let count = self.stats.record(language, reason, now);
        let milestone = self.stats.take_milestone(rule);
        let auto_paused = self.maybe_auto_pause(rule, now);
        host.notify_skip(&SkipNotice {
            language: language.to_string(),
            reason,
            count,
            milestone,
            toast: self.config.file.notifications.show_skip_toasts,
            auto_paused,
        });
    }

    fn maybe_auto_pause(&mut self, rule: SuppressRule, now: Instant) -> bool {
        let cfg = &self.config.file.auto_pause;
        if !cfg.enabled || cfg.trigger_count == 0 || self.pause.is_paused(now) {
            return false;
        }
        if !self.stats.take_auto_pause(rule, cfg.trigger_count) {
            return false;
        }
        let duration = (cfg.duration_ms > 0).then(|| Duration::from_millis(cfg.duration_ms));
        info!(target: "session", rule = rule.name(), duration_ms = cfg.duration_ms, "detection_auto_paused");
        self.pause = PauseState::starting(now, duration);
        true
    }

    /// Remember the latest non-empty mouse or command selection for delimiter
    /// wrapping. Keyboard selections (shift+arrows) are not captured.
    pub fn on_selection_change(&mut self, change: &SelectionChange) {
        if change.text.is_empty() || change.kind == SelectionKind::Keyboard {
            return;
        }
        trace!(target: "session", kind = ?change.kind, len = change.text.chars().count(), "selection_stored");
        self.selection = Some(PendingSelection::new(change.text.clone(), change.anchor));
    }

    /// Swap in a freshly loaded configuration and drop memoized mappings.
    pub fn on_config_change(&mut self, config: Config) {
        self.config = config;
        self.reload_tables();
        info!(
            target: "session",
            enabled = self.config.file.enabled,
            scopes = self.config.file.mappings.len(),
            "config_reloaded"
        );
    }

    /// Advance timers: expire a finished pause, force open a gate whose write
    /// never settled, and run the pending resolver pass once it is due.
    pub fn poll<H: EditorHost>(&mut self, now: Instant, host: &mut H) -> Option<PassReport> {
        if self.pause.is_expired(now) {
            self.pause = PauseState::Running;
            info!(target: "session", "detection_resumed");
        }
        if self.gate.is_stale(now, SETTLE_TIMEOUT) {
            warn!(
                target: "session.gate",
                dropped_actions = self.post_mutation.len(),
                "settle_timeout"
            );
            self.post_mutation.clear();
            self.gate.release();
        }
        if self.gate.is_held() {
            return None;
        }
        let pass = self.debounce.take_due(now)?;
        self.run_pass(pass, now, host)
    }

    fn run_pass<H: EditorHost>(
        &mut self,
        pass: PendingPass,
        now: Instant,
        host: &mut H,
    ) -> Option<PassReport> {
        let guard = self.gate.try_enter()?;
        let entries = self.table.entries(&pass.language);
        let copy_map = self.config.file.copy_map;
        let clipboard = if copy_map {
            None
        } else {
            match host.read_clipboard() {
                Ok(text) => Some(text),
                Err(err) => {
                    debug!(target: "session", %err, "clipboard_unknown");
                    None
                }
            }
        };
        let input = ResolveInput {
            entries: &entries,
            pairs: &self.pairs,
            selection: self.selection.as_ref(),
            copy_map,
            clipboard: clipboard.as_deref(),
        };
        let resolution = resolve(&pass.edits, &input, &*host);
        let report = PassReport {
            edits: pass.edits.len(),
            replacements: resolution.replacements.len(),
            cursor_queued: resolution.cursor.is_some(),
        };
        if resolution.is_empty() {
            self.metrics.note_pass(0);
            debug!(target: "session", language = %pass.language, edits = report.edits, "resolver_pass_noop");
            return Some(report);
        }
        if let Err(err) = host.apply_edits(&resolution.replacements) {
            self.metrics.incr_pass_failure();
            error!(target: "session", language = %pass.language, %err, "resolver_pass_failed");
            return None;
        }
        if let Some(position) = resolution.cursor {
            self.post_mutation.push_back(PostMutation::MoveCursor(position));
        }
        guard.hold_until_settled(now);
        self.metrics.note_pass(report.replacements);
        debug!(
            target: "session",
            language = %pass.language,
            edits = report.edits,
            replacements = report.replacements,
            "resolver_pass"
        );
        Some(report)
    }

    /// The host applied our write. Opens the gate and drains deferred
    /// actions in order. Returns how many actions ran.
    pub fn settle<H: EditorHost>(&mut self, host: &mut H) -> usize {
        self.gate.release();
        let mut ran = 0;
        while let Some(action) = self.post_mutation.pop_front() {
            match action {
                PostMutation::MoveCursor(position) => match host.set_cursor(position) {
                    Ok(()) => {
                        self.metrics.incr_cursor_move();
                        ran += 1;
                    }
                    Err(err) => {
                        warn!(target: "session", line = position.line, character = position.character, %err, "cursor_move_failed");
                    }
                },
            }
        }
        ran
    }

    /// Bypass detection for `duration`, or until [`Session::resume`] when `None`.
    pub fn pause(&mut self, now: Instant, duration: Option<Duration>) {
        self.pause = PauseState::starting(now, duration);
        info!(
            target: "session",
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "detection_paused"
        );
    }

    pub fn resume(&mut self) {
        if self.pause != PauseState::Running {
            info!(target: "session", "detection_resumed");
        }
        self.pause = PauseState::Running;
    }

    pub fn pause_state(&self) -> PauseState {
        self.pause
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        self.pause.is_paused(now)
    }

    /// Status label for the active pause (`∞`, `30s`, ...), `None` when running.
    pub fn pause_label(&self, now: Instant) -> Option<String> {
        if !self.pause.is_paused(now) {
            return None;
        }
        self.pause.remaining(now).map(format_remaining)
    }

    /// Loosen the threshold behind `rule` by [`RELAX_MULTIPLIER`], scoped to
    /// `language` when given.
    pub fn relax_threshold(&mut self, rule: SuppressRule, language: Option<&str>) -> u64 {
        self.config
            .relax_threshold(rule.threshold_key(), language, RELAX_MULTIPLIER)
    }

    /// Save `key -> replacement` into a mapping scope and rebuild the tables
    /// so the next pass sees it.
    pub fn set_mapping(&mut self, scope: &str, key: &str, replacement: &str) -> anyhow::Result<()> {
        self.config.set_mapping(scope, key, replacement)?;
        self.reload_tables();
        Ok(())
    }

    /// Set or clear one detection threshold for `language`.
    pub fn set_override(&mut self, language: &str, key: ThresholdKey, value: Option<u64>) {
        self.config.set_override(language, key, value);
    }

    pub fn remove_override(&mut self, language: &str) -> bool {
        self.config.remove_override(language)
    }

    /// Languages whose mapping entries are currently memoized.
    pub fn cached_languages(&self) -> usize {
        self.table.cached_languages()
    }

    fn reload_tables(&mut self) {
        self.table.reload(&self.config);
        self.pairs = PairMap::from_config(&self.config);
    }

    /// Tear down everything tied to this activation.
    pub fn deactivate(&mut self) {
        let cancelled = self.debounce.cancel();
        self.tracker.reset();
        self.pause = PauseState::Running;
        self.gate.release();
        self.post_mutation.clear();
        self.selection = None;
        self.table.invalidate();
        info!(target: "session", cancelled_pass = cancelled, "session_deactivated");
    }
}
