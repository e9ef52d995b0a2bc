//! Processing gate around the resolver pass.
//!
//! The gate is entered when a pass starts and released by [`GateGuard`]'s
//! `Drop` on every exit path. A pass that hands edits to the host converts
//! the guard into [`GateState::InFlight`]; the gate then stays closed until
//! the host reports the mutation settled, so the echo of our own writes is
//! dropped instead of being detected and resolved again.

use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    Resolving,
    InFlight { since: Instant },
}

#[derive(Debug, Default)]
pub struct ProcessingGate {
    state: Cell<GateState>,
}

impl ProcessingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state.get()
    }

    pub fn is_held(&self) -> bool {
        self.state.get() != GateState::Idle
    }

    /// Close the gate for a pass, or `None` when already closed.
    pub fn try_enter(&self) -> Option<GateGuard<'_>> {
        if self.is_held() {
            return None;
        }
        self.state.set(GateState::Resolving);
        trace!(target: "session.gate", "gate_entered");
        Some(GateGuard {
            gate: self,
            armed: true,
        })
    }

    /// In flight for at least `timeout` as of `now`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        matches!(self.state.get(), GateState::InFlight { since } if now.saturating_duration_since(since) >= timeout)
    }

    pub fn release(&self) {
        if self.state.replace(GateState::Idle) != GateState::Idle {
            trace!(target: "session.gate", "gate_released");
        }
    }
}

/// Releases the gate on drop unless converted with [`GateGuard::hold_until_settled`].
#[derive(Debug)]
pub struct GateGuard<'g> {
    gate: &'g ProcessingGate,
    armed: bool,
}

impl GateGuard<'_> {
    pub fn hold_until_settled(mut self, now: Instant) {
        self.armed = false;
        self.gate.state.set(GateState::InFlight { since: now });
        trace!(target: "session.gate", "gate_in_flight");
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release();
        }
    }
}
