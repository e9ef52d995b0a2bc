use core_config::Config;
use indexmap::IndexMap;

pub const DEFAULT_PAIRS: &[(&str, &str)] = &[
    ("{", "}"),
    ("[", "]"),
    ("(", ")"),
    ("<", ">"),
    ("'", "'"),
    ("\"", "\""),
    ("`", "`"),
];

/// Opening delimiter -> closer, built-ins overlaid with `[pair_mappings]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairMap {
    pairs: IndexMap<String, String>,
}

impl Default for PairMap {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS
                .iter()
                .map(|(open, close)| (open.to_string(), close.to_string()))
                .collect(),
        }
    }
}

impl PairMap {
    pub fn from_config(config: &Config) -> Self {
        let mut map = Self::default();
        for (open, close) in &config.file.pair_mappings {
            map.pairs.insert(open.clone(), close.clone());
        }
        map
    }

    pub fn is_opening(&self, text: &str) -> bool {
        self.pairs.contains_key(text)
    }

    pub fn closer(&self, open: &str) -> Option<&str> {
        self.pairs.get(open).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
