//! Edit resolver.
//!
//! Given a batch the detector let through, compute the rewrite for each edit:
//! * greedy backward extension lets a newly typed character complete a
//!   multi-character key whose leading characters are already in the line;
//! * every mapping entry is applied as a global literal substitution, in
//!   table order, each seeing the output of the previous one;
//! * an opening delimiter typed over a remembered selection wraps it, and a
//!   `$1` marker in the rewritten text becomes a cursor destination.
//!
//! The resolver does not mutate anything. It returns the replacements to
//! apply in one transaction and, at most, one cursor position to move to once
//! that transaction has landed.

use core_mapping::{MappingEntry, PairMap};
use core_text::{Edit, Position, Replacement, TextRange, TextView, char_slice};
use std::borrow::Cow;
use tracing::{debug, trace};

/// Placeholder marking where the cursor (or wrapped selection) goes.
pub const CURSOR_MARKER: &str = "$1";

/// Last non-empty selection observed before the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    pub text: String,
    pub anchor: Position,
}

impl PendingSelection {
    pub fn new(text: impl Into<String>, anchor: Position) -> Self {
        Self {
            text: text.into(),
            anchor,
        }
    }

    fn touches(&self, range: &TextRange) -> bool {
        self.anchor == range.start || self.anchor == range.end
    }
}

/// Everything the resolver reads besides the batch and the live buffer.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInput<'a> {
    pub entries: &'a [MappingEntry],
    pub pairs: &'a PairMap,
    pub selection: Option<&'a PendingSelection>,
    /// Copy interception: when `false`, text equal to `clipboard` is skipped.
    pub copy_map: bool,
    /// Current clipboard text, `None` when unknown or unreadable.
    pub clipboard: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub replacements: Vec<Replacement>,
    /// Where to put the primary cursor after the replacements are applied.
    pub cursor: Option<Position>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Resolve every edit of `batch`, in order, against the live buffer `view`.
pub fn resolve(batch: &[Edit], input: &ResolveInput<'_>, view: &dyn TextView) -> Resolution {
    let mut out = Resolution::default();
    for (idx, edit) in batch.iter().enumerate() {
        if let Some((replacement, cursor)) = resolve_edit(edit, input, view) {
            debug!(
                target: "resolve",
                idx,
                inserted = edit.char_len(),
                rewritten = replacement.text.chars().count(),
                cursor = cursor.is_some(),
                "edit_rewritten"
            );
            out.replacements.push(replacement);
            if cursor.is_some() {
                out.cursor = cursor;
            }
        }
    }
    out
}

fn resolve_edit(
    edit: &Edit,
    input: &ResolveInput<'_>,
    view: &dyn TextView,
) -> Option<(Replacement, Option<Position>)> {
    if edit.text.trim().is_empty() {
        return None;
    }
    if !input.copy_map && input.clipboard == Some(edit.text.as_str()) {
        trace!(target: "resolve", len = edit.char_len(), "clipboard_match_skipped");
        return None;
    }

    let (mut text, offset) = rewrite(edit, input.entries, view);
    if text == edit.text {
        return None;
    }

    let start = view.position_at(edit.range_offset.saturating_sub(offset));
    let end = view.position_at(edit.range_offset + edit.char_len());
    let is_template = text.contains(CURSOR_MARKER);
    let mut cursor = None;

    match input.selection.filter(|sel| sel.touches(&edit.range)) {
        Some(sel) if is_template || input.pairs.is_opening(&text) => {
            if let Some((before, after)) = text.split_once(CURSOR_MARKER) {
                cursor = Some(start.advance(before).advance(&sel.text));
                text = format!("{before}{}{after}", sel.text);
            } else {
                let closer = input.pairs.closer(&text).unwrap_or(&text).to_string();
                text = format!("{text}{}{closer}", sel.text);
            }
        }
        _ => {
            if let Some((before, after)) = text.split_once(CURSOR_MARKER) {
                cursor = Some(start.advance(before));
                text = format!("{before}{after}");
            }
        }
    }

    Some((Replacement::new(TextRange::new(start, end), text), cursor))
}

/// Apply the mapping entries to the edit's text. Returns the rewritten text
/// and how many characters left of the edit start it now covers.
fn rewrite(edit: &Edit, entries: &[MappingEntry], view: &dyn TextView) -> (String, usize) {
    let col = edit.range.start.character;
    let end_col = col + edit.char_len();
    let mut text = edit.text.clone();
    let mut offset = 0usize;
    let mut line: Option<Option<String>> = None;

    for entry in entries {
        let len = text.chars().count();
        if len < entry.key_len && entry.key.ends_with(text.as_str()) {
            let line = line.get_or_insert_with(|| view.line_text(edit.range.start.line));
            if let Some(extended) = extend_left(line.as_deref(), entry, col - offset, len, end_col)
            {
                offset = col - extended;
                text = entry.key.clone();
            }
        }
        if let Cow::Owned(replaced) = entry.apply(&text) {
            text = replaced;
        }
    }
    (text, offset)
}

/// Try to grow the working text leftwards into `entry.key`. `from` is the
/// column where the working text currently begins. Returns the new start
/// column when the buffer window `[start, end_col)` spells the key exactly.
fn extend_left(
    line: Option<&str>,
    entry: &MappingEntry,
    from: usize,
    len: usize,
    end_col: usize,
) -> Option<usize> {
    let line = line?;
    let start = from.checked_sub(entry.key_len - len)?;
    (char_slice(line, start, end_col)? == entry.key).then_some(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::Document;
    use pretty_assertions::assert_eq;

    fn entries(pairs: &[(&str, &str)]) -> Vec<MappingEntry> {
        pairs
            .iter()
            .map(|(k, v)| MappingEntry::new(k, v).unwrap())
            .collect()
    }

    fn input<'a>(entries: &'a [MappingEntry], pairs: &'a PairMap) -> ResolveInput<'a> {
        ResolveInput {
            entries,
            pairs,
            selection: None,
            copy_map: false,
            clipboard: None,
        }
    }

    /// Type `text` at `pos` into `doc`, returning the host change record.
    fn type_at(doc: &mut Document, line: usize, character: usize, text: &str) -> Edit {
        let pos = Position::new(line, character);
        doc.apply_edit(TextRange::caret(pos), text).unwrap()
    }

    struct NoLines;

    impl TextView for NoLines {
        fn line_text(&self, _line: usize) -> Option<String> {
            None
        }
        fn position_at(&self, offset: usize) -> Position {
            Position::new(0, offset)
        }
        fn offset_at(&self, position: Position) -> usize {
            position.character
        }
    }

    #[test]
    fn plain_substitution_replaces_inserted_span() {
        let table = entries(&[("（", "(")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("fn main");
        let edit = type_at(&mut doc, 0, 7, "（");
        let res = resolve(&[edit], &input(&table, &pairs), &doc);
        assert_eq!(
            res.replacements,
            vec![Replacement::new(
                TextRange::new(Position::new(0, 7), Position::new(0, 8)),
                "("
            )]
        );
        assert_eq!(res.cursor, None);
    }

    #[test]
    fn text_without_keys_is_never_replaced() {
        let table = entries(&[("（", "("), ("。", ".")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("");
        let edit = type_at(&mut doc, 0, 0, "plain");
        assert!(resolve(&[edit], &input(&table, &pairs), &doc).is_empty());
    }

    #[test]
    fn whitespace_only_edits_are_skipped() {
        let table = entries(&[(" ", "_")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("a");
        let edit = type_at(&mut doc, 0, 1, "  ");
        assert!(resolve(&[edit], &input(&table, &pairs), &doc).is_empty());
    }

    #[test]
    fn clipboard_text_is_left_alone_unless_copy_map() {
        let table = entries(&[("，", ",")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("");
        let edit = type_at(&mut doc, 0, 0, "a，b");
        let mut inp = input(&table, &pairs);
        inp.clipboard = Some("a，b");
        assert!(resolve(std::slice::from_ref(&edit), &inp, &doc).is_empty());
        inp.copy_map = true;
        let res = resolve(&[edit], &inp, &doc);
        assert_eq!(res.replacements[0].text, "a,b");
    }

    #[test]
    fn backward_extension_completes_multi_char_key() {
        let table = entries(&[("<<<", ">>>")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("a<<");
        let edit = type_at(&mut doc, 0, 3, "<");
        let res = resolve(&[edit], &input(&table, &pairs), &doc);
        assert_eq!(
            res.replacements,
            vec![Replacement::new(
                TextRange::new(Position::new(0, 1), Position::new(0, 4)),
                ">>>"
            )]
        );
    }

    #[test]
    fn backward_extension_requires_exact_window() {
        // Line "a<<" with the typed '<' at column 2: window [0,3) is "a<<".
        let table = entries(&[("<<<", ">>>"), ("<", "‹")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("a<");
        let edit = type_at(&mut doc, 0, 2, "<");
        assert_eq!(doc.line_text(0).as_deref(), Some("a<<"));
        let res = resolve(&[edit], &input(&table, &pairs), &doc);
        assert_eq!(
            res.replacements,
            vec![Replacement::new(
                TextRange::new(Position::new(0, 2), Position::new(0, 3)),
                "‹"
            )]
        );
    }

    #[test]
    fn extension_past_line_start_is_skipped() {
        let table = entries(&[("……", "^")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("");
        let edit = type_at(&mut doc, 0, 0, "…");
        assert!(resolve(&[edit], &input(&table, &pairs), &doc).is_empty());
    }

    #[test]
    fn missing_line_skips_entry_and_continues() {
        let table = entries(&[("……", "^"), ("…", "...")]);
        let pairs = PairMap::default();
        let edit = Edit::new(TextRange::caret(Position::new(0, 4)), 4, 0, "…");
        let res = resolve(&[edit], &input(&table, &pairs), &NoLines);
        assert_eq!(res.replacements[0].text, "...");
        assert_eq!(res.replacements[0].range.start, Position::new(0, 4));
    }

    #[test]
    fn later_entries_see_earlier_output() {
        let table = entries(&[("a", "b"), ("b", "c")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("");
        let edit = type_at(&mut doc, 0, 0, "a");
        let res = resolve(&[edit], &input(&table, &pairs), &doc);
        assert_eq!(res.replacements[0].text, "c");
    }

    #[test]
    fn selection_is_wrapped_by_opening_delimiter() {
        let table = entries(&[("（", "(")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("foo bar");
        let sel = PendingSelection::new("foo", Position::new(0, 3));
        let edit = doc
            .apply_edit(TextRange::new(Position::new(0, 0), Position::new(0, 3)), "（")
            .unwrap();
        let mut inp = input(&table, &pairs);
        inp.selection = Some(&sel);
        let res = resolve(&[edit], &inp, &doc);
        assert_eq!(res.replacements[0].text, "(foo)");
        assert_eq!(
            res.replacements[0].range,
            TextRange::new(Position::new(0, 0), Position::new(0, 1))
        );
    }

    #[test]
    fn configured_pair_wraps_selection() {
        let table = entries(&[("※", "*")]);
        let cfg = core_config::Config::from_toml_str("[pair_mappings]\n\"*\" = \"*\"\n").unwrap();
        let pairs = PairMap::from_config(&cfg);
        let mut doc = Document::from_str("note");
        let sel = PendingSelection::new("note", Position::new(0, 0));
        let edit = doc
            .apply_edit(TextRange::new(Position::new(0, 0), Position::new(0, 4)), "※")
            .unwrap();
        let mut inp = input(&table, &pairs);
        inp.selection = Some(&sel);
        let res = resolve(&[edit], &inp, &doc);
        assert_eq!(res.replacements[0].text, "*note*");
    }

    #[test]
    fn selection_elsewhere_is_ignored() {
        let table = entries(&[("（", "(")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("foo bar");
        let sel = PendingSelection::new("bar", Position::new(0, 7));
        let edit = type_at(&mut doc, 0, 0, "（");
        let mut inp = input(&table, &pairs);
        inp.selection = Some(&sel);
        let res = resolve(&[edit], &inp, &doc);
        assert_eq!(res.replacements[0].text, "(");
    }

    #[test]
    fn template_without_selection_strips_marker_and_moves_cursor() {
        let table = entries(&[("（", "($1)")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("call");
        let edit = type_at(&mut doc, 0, 4, "（");
        let res = resolve(&[edit], &input(&table, &pairs), &doc);
        assert_eq!(res.replacements[0].text, "()");
        assert_eq!(res.cursor, Some(Position::new(0, 5)));
    }

    #[test]
    fn template_with_selection_inserts_it_at_marker() {
        let table = entries(&[("（", "($1)")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("x = foo;");
        let sel = PendingSelection::new("foo", Position::new(0, 7));
        let edit = doc
            .apply_edit(TextRange::new(Position::new(0, 4), Position::new(0, 7)), "（")
            .unwrap();
        let mut inp = input(&table, &pairs);
        inp.selection = Some(&sel);
        let res = resolve(&[edit], &inp, &doc);
        assert_eq!(res.replacements[0].text, "(foo)");
        assert_eq!(res.cursor, Some(Position::new(0, 8)));
    }

    #[test]
    fn batch_order_is_preserved() {
        let table = entries(&[("（", "("), ("）", ")")]);
        let pairs = PairMap::default();
        let mut doc = Document::from_str("ab\ncd");
        let first = type_at(&mut doc, 1, 2, "）");
        let second = type_at(&mut doc, 0, 0, "（");
        let res = resolve(&[first, second], &input(&table, &pairs), &doc);
        let texts: Vec<_> = res.replacements.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec![")", "("]);
    }
}
