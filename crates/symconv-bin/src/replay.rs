//! JSON-lines edit traces.
//!
//! One step per line, timestamped relative to the start of the replay:
//!
//! ```text
//! {"at_ms": 0,   "step": "type", "line": 0, "character": 3, "text": "（", "language": "rust"}
//! {"at_ms": 120, "step": "select", "anchor": {"line": 0, "character": 9}, "text": "arg"}
//! {"at_ms": 200, "step": "clipboard", "text": "copied"}
//! {"at_ms": 300, "step": "undo", "line": 0, "character": 3, "end": {"line": 0, "character": 4}, "text": ""}
//! {"at_ms": 400, "step": "config"}
//! {"at_ms": 900, "step": "wait"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use core_events::{
    AsyncEventSource, ChangeReason, Event, HostEvent, InputEvent, SelectionKind,
};
use core_text::{Position, TextRange};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Quiet period after the last step so pending passes fire before shutdown.
pub const REPLAY_LINGER: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceLine {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub step: TraceStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum TraceStep {
    Type(TypedText),
    Undo(TypedText),
    Select {
        anchor: Position,
        text: String,
        #[serde(default)]
        kind: SelectionKind,
    },
    Clipboard {
        #[serde(default)]
        text: Option<String>,
    },
    Config,
    Wait,
}

/// Replace `[line:character, end)` with `text`; no `end` means insert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypedText {
    pub line: usize,
    pub character: usize,
    #[serde(default)]
    pub end: Option<Position>,
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl TypedText {
    fn range(&self) -> TextRange {
        let start = Position::new(self.line, self.character);
        TextRange::new(start, self.end.unwrap_or(start))
    }
}

impl TraceStep {
    /// Event fed to the loop, `None` for pure timing steps.
    pub fn to_event(&self, default_language: &str) -> Option<Event> {
        let typed = |t: &TypedText, reason| {
            Event::Input(InputEvent::Type {
                language: t
                    .language
                    .clone()
                    .unwrap_or_else(|| default_language.to_string()),
                range: t.range(),
                text: t.text.clone(),
                reason,
            })
        };
        match self {
            TraceStep::Type(t) => Some(typed(t, ChangeReason::Normal)),
            TraceStep::Undo(t) => Some(typed(t, ChangeReason::Undo)),
            TraceStep::Select { anchor, text, kind } => Some(Event::Input(InputEvent::Select {
                anchor: *anchor,
                text: text.clone(),
                kind: *kind,
            })),
            TraceStep::Clipboard { text } => Some(Event::Input(InputEvent::Clipboard(text.clone()))),
            TraceStep::Config => Some(Event::Host(HostEvent::ConfigChanged)),
            TraceStep::Wait => None,
        }
    }
}

pub fn parse_trace(input: &str) -> Result<Vec<TraceLine>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, l)| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        })
        .map(|(idx, l)| {
            serde_json::from_str::<TraceLine>(l)
                .with_context(|| format!("trace line {}", idx + 1))
        })
        .collect()
}

/// Replays a parsed trace into the event channel, then requests shutdown.
pub struct TraceReplaySource {
    steps: Vec<TraceLine>,
    language: String,
    linger: Duration,
}

impl TraceReplaySource {
    pub fn new(steps: Vec<TraceLine>, language: impl Into<String>) -> Self {
        Self {
            steps,
            language: language.into(),
            linger: REPLAY_LINGER,
        }
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }
}

impl AsyncEventSource for TraceReplaySource {
    fn name(&self) -> &'static str {
        "trace_replay"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let total = self.steps.len();
            for (idx, line) in self.steps.iter().enumerate() {
                tokio::time::sleep_until(start + Duration::from_millis(line.at_ms)).await;
                let Some(event) = line.step.to_event(&self.language) else {
                    continue;
                };
                debug!(target: "runtime.events", idx, at_ms = line.at_ms, "trace_step");
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            tokio::time::sleep(self.linger).await;
            info!(target: "runtime.events", steps = total, "trace_finished");
            let _ = tx.send(Event::Shutdown).await;
        })
    }
}
