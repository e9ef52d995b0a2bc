//! Symbol mapping table.
//!
//! Composition order for a language (later wins, first position kept):
//! built-in punctuation defaults → `[mappings.base]` → `[mappings.<language>]`.
//! The composed list is memoized per language id until [`MappingTable::reload`]
//! or [`MappingTable::invalidate`] drops the cache.
//!
//! Each entry carries a compiled literal matcher over its escaped key. The
//! replacement is inserted verbatim (no `$n` expansion), so templates such as
//! `($1)` survive substitution intact for the resolver to interpret.

use core_config::{BASE_SCOPE, Config};
use indexmap::IndexMap;
use regex::{NoExpand, Regex, RegexBuilder};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

mod pairs;
pub use pairs::{DEFAULT_PAIRS, PairMap};

/// Full-width punctuation folded to its ASCII counterpart.
pub const DEFAULT_SYMBOLS: &[(&str, &str)] = &[
    ("【", "["),
    ("】", "]"),
    ("（", "("),
    ("）", ")"),
    ("《", "<"),
    ("》", ">"),
    ("「", "{"),
    ("」", "}"),
    ("¥", "$"),
    ("……", "^"),
    ("。", "."),
    ("，", ","),
    ("：", ":"),
    ("；", ";"),
    ("？", "?"),
    ("！", "!"),
    ("“", "\""),
    ("”", "\""),
    ("‘", "'"),
    ("’", "'"),
    ("～", "~"),
    ("·", "`"),
];

#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub key: String,
    pub replacement: String,
    /// Key length in characters.
    pub key_len: usize,
    pattern: Regex,
}

impl MappingEntry {
    pub fn new(key: &str, replacement: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&regex::escape(key))
            .multi_line(true)
            .build()?;
        Ok(Self {
            key: key.to_string(),
            replacement: replacement.to_string(),
            key_len: key.chars().count(),
            pattern,
        })
    }

    /// Replace every occurrence of the key in `text`.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern
            .replace_all(text, NoExpand(self.replacement.as_str()))
    }
}

/// Per-language memo of composed mapping entries.
#[derive(Debug, Default)]
pub struct MappingTable {
    scopes: IndexMap<String, IndexMap<String, String>>,
    cache: HashMap<String, Arc<[MappingEntry]>>,
}

impl MappingTable {
    pub fn new(scopes: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self {
            scopes,
            cache: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.file.mappings.clone())
    }

    /// Swap in new scopes from `config` and drop every memoized language.
    pub fn reload(&mut self, config: &Config) {
        self.scopes = config.file.mappings.clone();
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!(target: "mapping", languages = self.cache.len(), "mapping_cache_cleared");
        }
        self.cache.clear();
    }

    pub fn cached_languages(&self) -> usize {
        self.cache.len()
    }

    /// Composed entries for `language`, in application order.
    pub fn entries(&mut self, language: &str) -> Arc<[MappingEntry]> {
        if let Some(hit) = self.cache.get(language) {
            return Arc::clone(hit);
        }
        let entries: Arc<[MappingEntry]> = self.compose(language).into();
        debug!(
            target: "mapping",
            language,
            entries = entries.len(),
            "mapping_cache_miss"
        );
        self.cache.insert(language.to_string(), Arc::clone(&entries));
        entries
    }

    fn compose(&self, language: &str) -> Vec<MappingEntry> {
        let mut merged: IndexMap<&str, &str> = DEFAULT_SYMBOLS.iter().copied().collect();
        let layers = [self.scopes.get(BASE_SCOPE), self.scopes.get(language)];
        for scope in layers.into_iter().flatten() {
            for (key, replacement) in scope {
                if key.is_empty() {
                    warn!(target: "mapping", language, "empty_mapping_key_skipped");
                    continue;
                }
                merged.insert(key.as_str(), replacement.as_str());
            }
        }
        merged
            .into_iter()
            .filter_map(|(key, replacement)| match MappingEntry::new(key, replacement) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(target: "mapping", language, error = %e, "mapping_pattern_rejected");
                    None
                }
            })
            .collect()
    }
}
