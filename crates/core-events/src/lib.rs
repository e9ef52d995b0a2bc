//! Core event types and channel helpers for the symbol conversion runtime.
//!
//! Two families of events flow through the loop: `InputEvent`s describe what
//! the user did to the document (typing, selecting, copying), `HostEvent`s are
//! the notifications an editor host publishes in response (text changed,
//! selection changed, configuration changed, mutation settled). The session
//! only ever consumes `HostEvent`s.

use core_text::{Edit, Position, TextRange};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers await `send`, so a slow consumer
// applies backpressure to the replay source instead of dropping edits. The host echo of the
// resolver's own writes uses `try_send`; it must never block the loop that consumes it.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 8192;

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Host(HostEvent),
    /// Periodic monotonic tick used to fire the debounce slot and expire pauses.
    Tick,
    Shutdown,
}

/// Why the host changed the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeReason {
    #[default]
    Normal,
    Undo,
    Redo,
}

impl ChangeReason {
    pub fn is_history(self) -> bool {
        matches!(self, Self::Undo | Self::Redo)
    }
}

/// What caused a selection to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Keyboard,
    Mouse,
    #[default]
    Command,
}

/// User-side actions replayed against the in-memory host.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Replace `range` with `text` in a document of `language`.
    Type {
        language: String,
        range: TextRange,
        text: String,
        reason: ChangeReason,
    },
    /// Select `text`; `anchor` is where the host reports the selection.
    Select {
        anchor: Position,
        text: String,
        kind: SelectionKind,
    },
    /// Set (or clear) the system clipboard.
    Clipboard(Option<String>),
}

/// Host notification: one batch of edits delivered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub language: String,
    pub reason: ChangeReason,
    pub edits: Vec<Edit>,
}

impl TextChange {
    pub fn new(language: impl Into<String>, reason: ChangeReason, edits: Vec<Edit>) -> Self {
        Self {
            language: language.into(),
            reason,
            edits,
        }
    }

    /// Sum of inserted characters across the batch.
    pub fn inserted_chars(&self) -> usize {
        self.edits.iter().map(Edit::char_len).sum()
    }
}

/// Host notification: the primary selection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub anchor: Position,
    pub text: String,
    pub kind: SelectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    TextChanged(TextChange),
    SelectionChanged(SelectionChange),
    /// Mapping or detection settings may have changed on disk.
    ConfigChanged,
    /// A buffer mutation requested by the session has been applied and echoed.
    MutationSettled,
}

// -------------------------------------------------------------------------------------------------
// Event Transform Hooks
// -------------------------------------------------------------------------------------------------
/// Optional hooks that can observe events at the loop boundary. These hooks should not block.
pub trait EventHooks: Send + Sync + 'static {
    fn pre_handle(&self, _event: &Event) {}
    fn post_handle(&self, _event: &Event) {}
}

/// Default no-op hooks implementation.
pub struct NoopEventHooks;

impl EventHooks for NoopEventHooks {}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Every producer (trace replay, config watcher, tick) registers uniformly. Each source owns its
// async task; on channel send failure (consumer dropped) it must terminate promptly.

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors should
    /// stop when `tx.send(..).await` returns Err (channel closed) or on their own internal stop
    /// condition.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; during shutdown the caller should drop its final `Sender` clone before
    /// awaiting the returned handles so the sources observe the closed channel and exit.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Take ownership so duplicate spawns are prevented if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source. Emits `Event::Tick` every configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}
