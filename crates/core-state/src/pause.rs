use std::time::{Duration, Instant};

/// Whether bulk detection is currently bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseState {
    #[default]
    Running,
    /// Paused until explicitly resumed.
    Indefinite,
    /// Paused until the given instant.
    Until(Instant),
}

/// Time left on a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Forever,
    For(Duration),
}

impl PauseState {
    /// `None` pauses until resumed.
    pub fn starting(now: Instant, duration: Option<Duration>) -> Self {
        match duration {
            Some(d) => now
                .checked_add(d)
                .map_or(PauseState::Indefinite, PauseState::Until),
            None => PauseState::Indefinite,
        }
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        match self {
            PauseState::Running => false,
            PauseState::Indefinite => true,
            PauseState::Until(at) => now < *at,
        }
    }

    /// A timed pause whose deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self, PauseState::Until(at) if now >= *at)
    }

    pub fn remaining(&self, now: Instant) -> Option<Remaining> {
        match self {
            PauseState::Running => None,
            PauseState::Indefinite => Some(Remaining::Forever),
            PauseState::Until(at) => Some(Remaining::For(at.saturating_duration_since(now))),
        }
    }
}

/// Compact label for status displays: `∞`, `45s`, `3m`, `2h`. Anything under
/// a second still renders as `1s`.
pub fn format_remaining(remaining: Remaining) -> String {
    let d = match remaining {
        Remaining::Forever => return "∞".to_string(),
        Remaining::For(d) => d,
    };
    let seconds = ((d.as_millis() as f64 / 1000.0).round() as u64).max(1);
    if seconds >= 3600 {
        format!("{}h", (seconds as f64 / 3600.0).round() as u64)
    } else if seconds >= 60 {
        format!("{}m", (seconds as f64 / 60.0).round() as u64)
    } else {
        format!("{seconds}s")
    }
}
