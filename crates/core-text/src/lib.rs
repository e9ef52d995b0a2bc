//! Text coordinates, edit records and the rope-backed document.
//!
//! Coordinates are character based: a `Position` is a zero-based line plus a
//! zero-based character column inside that line, and absolute offsets count
//! characters from the start of the document. Every length reported by this
//! crate (and consumed by the detector and resolver) is a character count,
//! never a byte count.

use serde::{Deserialize, Serialize};

mod document;
pub use document::{Document, TextError};

/// A location inside a document expressed as (line index, character column).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }

    pub const fn origin() -> Self {
        Self {
            line: 0,
            character: 0,
        }
    }

    /// Position reached after writing `text` starting at `self`.
    pub fn advance(self, text: &str) -> Self {
        let mut pos = self;
        for ch in text.chars() {
            if ch == '\n' {
                pos.line += 1;
                pos.character = 0;
            } else {
                pos.character += 1;
            }
        }
        pos
    }
}

/// Half-open span `[start, end)` between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width range at `pos` (a pure insertion point).
    pub const fn caret(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of line boundaries crossed by the range.
    pub fn line_span(&self) -> usize {
        self.end.line.saturating_sub(self.start.line)
    }
}

/// One contiguous change as reported by the host: the replaced range (in
/// coordinates of the document *before* the change), its absolute offset and
/// length, and the inserted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub range: TextRange,
    pub range_offset: usize,
    pub range_length: usize,
    pub text: String,
}

impl Edit {
    pub fn new(
        range: TextRange,
        range_offset: usize,
        range_length: usize,
        text: impl Into<String>,
    ) -> Self {
        Self {
            range,
            range_offset,
            range_length,
            text: text.into(),
        }
    }

    /// Character count of the inserted text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A rewrite produced by the resolver, applied by the host in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub range: TextRange,
    pub text: String,
}

impl Replacement {
    pub fn new(range: TextRange, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

/// Read-only view over live buffer content.
///
/// Hosts implement this over whatever buffer they own; `Document` is the
/// in-memory implementation used by the runtime and the tests.
pub trait TextView {
    /// Text of `line` without its line terminator, or `None` when out of range.
    fn line_text(&self, line: usize) -> Option<String>;
    /// Convert an absolute character offset into a position (clamped to the document).
    fn position_at(&self, offset: usize) -> Position;
    /// Convert a position into an absolute character offset (clamped to the document).
    fn offset_at(&self, position: Position) -> usize;
}

/// Slice `[start, end)` of `line` by character columns. Returns `None` when the
/// window runs past the end of the line.
pub fn char_slice(line: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = line.char_indices().map(|(i, _)| i).chain(Some(line.len()));
    let from = indices.nth(start)?;
    let to = if end == start {
        from
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&line[from..to])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_newlines() {
        let p = Position::new(2, 4).advance("ab\ncd");
        assert_eq!(p, Position::new(3, 2));
        assert_eq!(Position::new(1, 1).advance(""), Position::new(1, 1));
    }

    #[test]
    fn position_ordering_is_line_major() {
        assert!(Position::new(1, 0) > Position::new(0, 99));
        assert!(Position::new(1, 2) < Position::new(1, 3));
    }

    #[test]
    fn line_span_counts_crossed_lines() {
        let r = TextRange::new(Position::new(3, 5), Position::new(7, 0));
        assert_eq!(r.line_span(), 4);
        assert_eq!(TextRange::caret(Position::new(3, 1)).line_span(), 0);
    }

    #[test]
    fn char_slice_uses_character_columns() {
        assert_eq!(char_slice("a<<", 0, 3), Some("a<<"));
        assert_eq!(char_slice("a<<", 1, 3), Some("<<"));
        assert_eq!(char_slice("a<<", 3, 3), Some(""));
        assert_eq!(char_slice("a<<", 1, 4), None);
        assert_eq!(char_slice("你好……", 2, 4), Some("……"));
    }

    #[test]
    fn edit_length_counts_characters() {
        let e = Edit::new(TextRange::default(), 0, 0, "（）");
        assert_eq!(e.char_len(), 2);
    }
}
