use anyhow::Result;
use core_events::{ChangeReason, Event, HostEvent, InputEvent, SelectionChange, TextChange};
use core_state::{EditorHost, HostError, SkipNotice};
use core_text::{Document, Position, Replacement, TextView};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

pub const DEFAULT_LANGUAGE: &str = "plaintext";

/// In-memory editor host: owns the document, the clipboard and the cursor,
/// and echoes its own writes back into the event loop the way a real editor
/// publishes change notifications.
pub struct ReplayHost {
    doc: Document,
    language: String,
    clipboard: Option<String>,
    cursor: Position,
    echo: Option<Sender<Event>>,
}

impl ReplayHost {
    pub fn new(doc: Document, echo: Option<Sender<Event>>) -> Self {
        Self {
            doc,
            language: DEFAULT_LANGUAGE.to_string(),
            clipboard: None,
            cursor: Position::origin(),
            echo,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Drop the echo sender so the event channel can close.
    pub fn disconnect(&mut self) {
        self.echo = None;
    }

    pub fn apply_text(
        &mut self,
        language: &str,
        range: core_text::TextRange,
        text: &str,
        reason: ChangeReason,
    ) -> Result<TextChange> {
        let edit = self.doc.apply_edit(range, text)?;
        self.language = language.to_string();
        self.cursor = range.start.advance(text);
        Ok(TextChange::new(language, reason, vec![edit]))
    }

    /// Perform a user action. Returns the notification the host publishes
    /// for it, if any.
    pub fn apply_input(&mut self, input: &InputEvent) -> Result<Option<HostEvent>> {
        match input {
            InputEvent::Type {
                language,
                range,
                text,
                reason,
            } => {
                let change = self.apply_text(language, *range, text, *reason)?;
                Ok(Some(HostEvent::TextChanged(change)))
            }
            InputEvent::Select { anchor, text, kind } => {
                self.cursor = *anchor;
                Ok(Some(HostEvent::SelectionChanged(SelectionChange {
                    anchor: *anchor,
                    text: text.clone(),
                    kind: *kind,
                })))
            }
            InputEvent::Clipboard(text) => {
                self.clipboard = text.clone();
                Ok(None)
            }
        }
    }

    fn send_echo(&self, event: HostEvent) {
        let Some(tx) = self.echo.as_ref() else {
            return;
        };
        match tx.try_send(Event::Host(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(target: "runtime.events", "echo_dropped_full"),
            Err(TrySendError::Closed(_)) => warn!(target: "runtime.events", "echo_dropped_closed"),
        }
    }
}

impl TextView for ReplayHost {
    fn line_text(&self, line: usize) -> Option<String> {
        self.doc.line_text(line)
    }

    fn position_at(&self, offset: usize) -> Position {
        self.doc.position_at(offset)
    }

    fn offset_at(&self, position: Position) -> usize {
        self.doc.offset_at(position)
    }
}

impl EditorHost for ReplayHost {
    fn read_clipboard(&mut self) -> Result<String, HostError> {
        self.clipboard
            .clone()
            .ok_or_else(|| HostError::ClipboardUnavailable("nothing copied".into()))
    }

    fn apply_edits(&mut self, replacements: &[Replacement]) -> Result<(), HostError> {
        let edits = self.doc.apply_replacements(replacements)?;
        self.send_echo(HostEvent::TextChanged(TextChange::new(
            self.language.clone(),
            ChangeReason::Normal,
            edits,
        )));
        self.send_echo(HostEvent::MutationSettled);
        Ok(())
    }

    fn set_cursor(&mut self, position: Position) -> Result<(), HostError> {
        self.doc.checked_offset(position)?;
        self.cursor = position;
        Ok(())
    }

    fn notify_skip(&mut self, notice: &SkipNotice) {
        if let Some(milestone) = notice.milestone {
            let hint = notice.reason.rule().hint();
            info!(
                target: "runtime",
                milestone,
                title = hint.title,
                setting = hint.setting_key,
                "skip_milestone"
            );
        }
        if notice.toast {
            eprintln!(
                "symbol conversion skipped in {}: {}",
                notice.language, notice.reason
            );
        }
        if notice.auto_paused {
            eprintln!(
                "bulk detection auto-paused: {}",
                notice.reason.rule().hint().title
            );
        }
    }
}
