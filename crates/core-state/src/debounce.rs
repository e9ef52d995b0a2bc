use core_text::Edit;
use std::time::{Duration, Instant};

pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(50);

/// A resolver pass waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPass {
    pub language: String,
    pub edits: Vec<Edit>,
    pub due: Instant,
}

/// Single-slot debounce: arming replaces whatever was pending, so at most
/// one pass is ever scheduled.
#[derive(Debug, Clone)]
pub struct DebounceSlot {
    delay: Duration,
    pending: Option<PendingPass>,
}

impl Default for DebounceSlot {
    fn default() -> Self {
        Self::new(DEBOUNCE_DELAY)
    }
}

impl DebounceSlot {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule a pass `delay` after `now`. Returns true when an earlier
    /// pending pass was discarded.
    pub fn arm(&mut self, language: &str, edits: Vec<Edit>, now: Instant) -> bool {
        self.pending
            .replace(PendingPass {
                language: language.to_string(),
                edits,
                due: now + self.delay,
            })
            .is_some()
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    pub fn take_due(&mut self, now: Instant) -> Option<PendingPass> {
        match &self.pending {
            Some(p) if p.due <= now => self.pending.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::{Position, TextRange};

    fn edit(text: &str) -> Edit {
        Edit::new(TextRange::caret(Position::origin()), 0, 0, text)
    }

    #[test]
    fn arming_replaces_pending_pass() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::default();
        assert!(!slot.arm("rust", vec![edit("a")], t0));
        assert!(slot.arm("rust", vec![edit("b")], t0 + Duration::from_millis(30)));
        assert_eq!(slot.take_due(t0 + Duration::from_millis(60)), None);
        let pass = slot.take_due(t0 + Duration::from_millis(80)).unwrap();
        assert_eq!(pass.edits, vec![edit("b")]);
        assert!(!slot.is_armed());
    }

    #[test]
    fn cancel_empties_slot() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::new(Duration::ZERO);
        slot.arm("go", vec![edit("x")], t0);
        assert_eq!(slot.due_at(), Some(t0));
        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert_eq!(slot.take_due(t0), None);
    }
}
