use ropey::Rope;
use thiserror::Error;

use crate::{Edit, Position, Replacement, TextRange, TextView};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("line {line} is outside the document ({line_count} lines)")]
    LineOutOfRange { line: usize, line_count: usize },
    #[error("column {character} is past the end of line {line} ({len} characters)")]
    ColumnOutOfRange {
        line: usize,
        character: usize,
        len: usize,
    },
    #[error("range end {end:?} precedes start {start:?}")]
    InvertedRange { start: Position, end: Position },
    #[error("edits overlap at offset {offset}")]
    Overlapping { offset: usize },
}

/// In-memory document backed by a `ropey::Rope`.
#[derive(Debug, Clone, Default)]
pub struct Document {
    rope: Rope,
}

impl Document {
    pub fn from_str(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Total number of lines (a trailing newline opens one more, empty line).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_len(&self, line: usize) -> usize {
        let slice = self.rope.line(line);
        let mut len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            len -= 1;
            if len > 0 && slice.char(len - 1) == '\r' {
                len -= 1;
            }
        }
        len
    }

    /// Strict conversion: errors instead of clamping.
    pub fn checked_offset(&self, pos: Position) -> Result<usize, TextError> {
        let line_count = self.line_count();
        if pos.line >= line_count {
            return Err(TextError::LineOutOfRange {
                line: pos.line,
                line_count,
            });
        }
        let len = self.line_len(pos.line);
        if pos.character > len {
            return Err(TextError::ColumnOutOfRange {
                line: pos.line,
                character: pos.character,
                len,
            });
        }
        Ok(self.rope.line_to_char(pos.line) + pos.character)
    }

    fn checked_span(&self, range: TextRange) -> Result<(usize, usize), TextError> {
        let start = self.checked_offset(range.start)?;
        let end = self.checked_offset(range.end)?;
        if end < start {
            return Err(TextError::InvertedRange {
                start: range.start,
                end: range.end,
            });
        }
        Ok((start, end))
    }

    /// Replace `range` with `text` and return the change record a host would
    /// publish for it.
    pub fn apply_edit(&mut self, range: TextRange, text: &str) -> Result<Edit, TextError> {
        let (start, end) = self.checked_span(range)?;
        self.rope.remove(start..end);
        self.rope.insert(start, text);
        Ok(Edit::new(range, start, end - start, text))
    }

    /// Apply all replacements as one transaction. Ranges are interpreted
    /// against the document as it is before the call; nothing is modified when
    /// any range is invalid or two ranges overlap. The returned change records
    /// are ordered from the end of the document towards the start.
    pub fn apply_replacements(
        &mut self,
        replacements: &[Replacement],
    ) -> Result<Vec<Edit>, TextError> {
        let mut spans = Vec::with_capacity(replacements.len());
        for r in replacements {
            let (start, end) = self.checked_span(r.range)?;
            spans.push((start, end, r));
        }
        spans.sort_by_key(|(start, end, _)| (*start, *end));
        for pair in spans.windows(2) {
            let (_, prev_end, _) = pair[0];
            let (next_start, _, _) = pair[1];
            if next_start < prev_end {
                return Err(TextError::Overlapping { offset: next_start });
            }
        }
        let mut changes = Vec::with_capacity(spans.len());
        for (start, end, r) in spans.into_iter().rev() {
            self.rope.remove(start..end);
            self.rope.insert(start, &r.text);
            changes.push(Edit::new(r.range, start, end - start, r.text.clone()));
        }
        Ok(changes)
    }
}

impl TextView for Document {
    fn line_text(&self, line: usize) -> Option<String> {
        if line >= self.line_count() {
            return None;
        }
        let len = self.line_len(line);
        Some(self.rope.line(line).slice(..len).to_string())
    }

    fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        Position::new(line, offset - self.rope.line_to_char(line))
    }

    fn offset_at(&self, position: Position) -> usize {
        let last = self.line_count().saturating_sub(1);
        let line = position.line.min(last);
        let character = position.character.min(self.line_len(line));
        self.rope.line_to_char(line) + character
    }
}
