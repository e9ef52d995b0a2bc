//! Configuration loading and parsing.
//!
//! Parses `symconv.toml` (or an override path provided by the binary). A
//! missing or unparsable file yields defaults so the session always starts.
//! Unknown fields are ignored to allow forward evolution, and detection
//! thresholds are read field-by-field (see [`bulk`]).
//!
//! Layering of detection thresholds for a language:
//! built-in defaults ⊕ `[bulk_detection]` ⊕ `[bulk_detection_overrides.<lang>]`.

use anyhow::Result;
use indexmap::IndexMap;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub mod bulk;
pub use bulk::{BulkDetectionConfig, BulkDetectionOverride, ThresholdKey};

/// Scope name whose mappings apply to every language.
pub const BASE_SCOPE: &str = "base";

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigFile {
    #[serde(default = "ConfigFile::default_enabled")]
    pub enabled: bool,
    /// When `false`, inserted text identical to the clipboard is left alone.
    #[serde(default)]
    pub copy_map: bool,
    #[serde(default)]
    pub excluded_languages: Vec<String>,
    /// Scope (`base` or a language id) -> symbol -> replacement, in file order.
    #[serde(default)]
    pub mappings: IndexMap<String, IndexMap<String, String>>,
    /// Opening delimiter -> closer, merged over the built-in pairs.
    #[serde(default)]
    pub pair_mappings: IndexMap<String, String>,
    #[serde(default, deserialize_with = "bulk::lenient_override")]
    pub bulk_detection: BulkDetectionOverride,
    #[serde(default, deserialize_with = "bulk::lenient_overrides")]
    pub bulk_detection_overrides: IndexMap<String, BulkDetectionOverride>,
    #[serde(default)]
    pub auto_pause: AutoPauseConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            copy_map: false,
            excluded_languages: Vec::new(),
            mappings: IndexMap::new(),
            pair_mappings: IndexMap::new(),
            bulk_detection: BulkDetectionOverride::default(),
            bulk_detection_overrides: IndexMap::new(),
            auto_pause: AutoPauseConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl ConfigFile {
    const fn default_enabled() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AutoPauseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "AutoPauseConfig::default_trigger_count")]
    pub trigger_count: u64,
    /// 0 pauses until resumed manually.
    #[serde(default = "AutoPauseConfig::default_duration_ms")]
    pub duration_ms: u64,
}

impl Default for AutoPauseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger_count: Self::default_trigger_count(),
            duration_ms: Self::default_duration_ms(),
        }
    }
}

impl AutoPauseConfig {
    const fn default_trigger_count() -> u64 {
        10
    }
    const fn default_duration_ms() -> u64 {
        60_000
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Surface every suppression to the user, not just the log.
    #[serde(default)]
    pub show_skip_toasts: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("symconv.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("symconv").join("symconv.toml");
    }
    PathBuf::from("symconv.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match Config::from_toml_str(&content) {
            Ok(cfg) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(cfg)
            }
            Err(e) => {
                // On parse error fall back to defaults rather than refusing to start.
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        },
        Err(_) => Ok(Config::default()),
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file = toml::from_str::<ConfigFile>(content)?;
        Ok(Self {
            raw: Some(content.to_string()),
            file,
        })
    }

    /// Global thresholds: defaults with `[bulk_detection]` applied.
    pub fn bulk_detection(&self) -> BulkDetectionConfig {
        BulkDetectionConfig::default().merged(&self.file.bulk_detection)
    }

    /// Effective thresholds for `language`.
    pub fn bulk_detection_for(&self, language: &str) -> BulkDetectionConfig {
        let global = self.bulk_detection();
        match self.file.bulk_detection_overrides.get(language) {
            Some(over) => global.merged(over),
            None => global,
        }
    }

    /// Languages the session never touches (an empty id is always excluded).
    pub fn is_excluded(&self, language: &str) -> bool {
        language.is_empty() || self.file.excluded_languages.iter().any(|l| l == language)
    }

    /// Raise one threshold by `multiplier`, writing into the language override
    /// when `language` is given and into `[bulk_detection]` otherwise. Returns
    /// the new value.
    pub fn relax_threshold(
        &mut self,
        key: ThresholdKey,
        language: Option<&str>,
        multiplier: f64,
    ) -> u64 {
        let default = BulkDetectionConfig::default().get(key);
        let current = language
            .and_then(|lang| self.file.bulk_detection_overrides.get(lang))
            .and_then(|over| over.get(key))
            .or_else(|| self.file.bulk_detection.get(key))
            .unwrap_or(default);
        let baseline = if current > 0 { current } else { default.max(1) };
        let next = ((baseline as f64 * multiplier).round() as u64).max(1);
        match language {
            Some(lang) => {
                self.file
                    .bulk_detection_overrides
                    .entry(lang.to_string())
                    .or_default()
                    .set(key, Some(next));
            }
            None => self.file.bulk_detection.set(key, Some(next)),
        }
        info!(
            target: "config",
            key = key.name(),
            language = language.unwrap_or(BASE_SCOPE),
            from = current,
            to = next,
            "threshold_relaxed"
        );
        next
    }

    /// Insert or replace `key -> replacement` in a mapping scope (`base` when
    /// `scope` is empty). An existing key keeps its position.
    pub fn set_mapping(&mut self, scope: &str, key: &str, replacement: &str) -> Result<()> {
        anyhow::ensure!(!key.is_empty(), "mapping key must not be empty");
        let scope = if scope.is_empty() { BASE_SCOPE } else { scope };
        self.file
            .mappings
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), replacement.to_string());
        info!(
            target: "config",
            scope,
            key_len = key.chars().count(),
            replacement_len = replacement.chars().count(),
            "mapping_saved"
        );
        Ok(())
    }

    /// Set (`Some`) or clear (`None`) one threshold for `language`. A table
    /// left with no fields is removed so the language inherits everything.
    pub fn set_override(&mut self, language: &str, key: ThresholdKey, value: Option<u64>) {
        let overrides = &mut self.file.bulk_detection_overrides;
        match value {
            Some(v) => overrides.entry(language.to_string()).or_default().set(key, Some(v)),
            None => {
                if let Some(over) = overrides.get_mut(language) {
                    over.set(key, None);
                    if over.is_empty() {
                        overrides.shift_remove(language);
                    }
                }
            }
        }
        info!(target: "config", language, key = key.name(), value = ?value, "override_updated");
    }

    /// Drop every override for `language`. Returns whether one existed.
    pub fn remove_override(&mut self, language: &str) -> bool {
        let removed = self
            .file
            .bulk_detection_overrides
            .shift_remove(language)
            .is_some();
        if removed {
            info!(target: "config", language, "override_removed");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.file.enabled);
        assert!(!cfg.file.copy_map);
        assert_eq!(cfg.bulk_detection(), BulkDetectionConfig::default());
        assert_eq!(cfg.file.auto_pause, AutoPauseConfig::default());
    }

    #[test]
    fn parses_global_thresholds_and_overrides() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[bulk_detection]\nmax_changes = 5\n\n[bulk_detection_overrides.markdown]\nmax_chars_per_change = 5000\nmax_changes = 0\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let global = cfg.bulk_detection();
        assert_eq!(global.max_changes, 5);
        assert_eq!(global.max_chars_per_change, 1000);

        let md = cfg.bulk_detection_for("markdown");
        assert_eq!(md.max_changes, 0);
        assert_eq!(md.max_chars_per_change, 5000);
        assert_eq!(md.max_recent_size, 2000);

        assert_eq!(cfg.bulk_detection_for("rust"), global);
    }

    #[test]
    fn malformed_override_table_does_not_discard_file() {
        let cfg = Config::from_toml_str(
            "copy_map = true\n[bulk_detection_overrides]\nrust = 4\n[bulk_detection_overrides.go]\nmax_changes = \"x\"\nmax_recent_size = 9\n",
        )
        .unwrap();
        assert!(cfg.file.copy_map);
        assert!(!cfg.file.bulk_detection_overrides.contains_key("rust"));
        let go = cfg.bulk_detection_for("go");
        assert_eq!(go.max_changes, 20);
        assert_eq!(go.max_recent_size, 9);
    }

    #[test]
    fn mapping_tables_keep_file_order() {
        let cfg = Config::from_toml_str(
            "[mappings.base]\n\"z\" = \"1\"\n\"a\" = \"2\"\n\"m\" = \"3\"\n[mappings.rust]\n\"=>\" = \"⇒\"\n",
        )
        .unwrap();
        let keys: Vec<_> = cfg.file.mappings[BASE_SCOPE].keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(cfg.file.mappings["rust"]["=>"], "⇒");
    }

    #[test]
    fn exclusion_covers_listed_and_empty_ids() {
        let cfg = Config::from_toml_str("excluded_languages = [\"markdown\"]\n").unwrap();
        assert!(cfg.is_excluded("markdown"));
        assert!(cfg.is_excluded(""));
        assert!(!cfg.is_excluded("rust"));
    }

    #[test]
    fn relax_threshold_writes_language_override() {
        let mut cfg = Config::default();
        let next = cfg.relax_threshold(ThresholdKey::MaxCharsPerChange, Some("rust"), 1.5);
        assert_eq!(next, 1500);
        assert_eq!(cfg.bulk_detection_for("rust").max_chars_per_change, 1500);
        assert_eq!(cfg.bulk_detection().max_chars_per_change, 1000);
        // Second relax builds on the override just written.
        let again = cfg.relax_threshold(ThresholdKey::MaxCharsPerChange, Some("rust"), 1.5);
        assert_eq!(again, 2250);
    }

    #[test]
    fn relax_threshold_on_disabled_rule_starts_from_default() {
        let mut cfg = Config::from_toml_str("[bulk_detection]\nmax_changes = 0\n").unwrap();
        let next = cfg.relax_threshold(ThresholdKey::MaxChanges, None, 1.5);
        assert_eq!(next, 30);
        assert_eq!(cfg.bulk_detection().max_changes, 30);
    }

    #[test]
    fn set_mapping_targets_scope_and_keeps_position() {
        let mut cfg =
            Config::from_toml_str("[mappings.base]\n\"a\" = \"1\"\n\"b\" = \"2\"\n").unwrap();
        cfg.set_mapping("", "a", "9").unwrap();
        cfg.set_mapping("rust", "->", "→").unwrap();
        let keys: Vec<_> = cfg.file.mappings[BASE_SCOPE].keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(cfg.file.mappings[BASE_SCOPE]["a"], "9");
        assert_eq!(cfg.file.mappings["rust"]["->"], "→");
        assert!(cfg.set_mapping(BASE_SCOPE, "", "x").is_err());
    }

    #[test]
    fn clearing_last_override_field_drops_the_table() {
        let mut cfg = Config::from_toml_str("[bulk_detection]\nmax_changes = 7\n").unwrap();
        cfg.set_override("markdown", ThresholdKey::MaxChanges, Some(40));
        cfg.set_override("markdown", ThresholdKey::MaxRecentSize, Some(9000));
        assert_eq!(cfg.bulk_detection_for("markdown").max_changes, 40);

        cfg.set_override("markdown", ThresholdKey::MaxChanges, None);
        assert_eq!(cfg.bulk_detection_for("markdown").max_changes, 7);
        assert!(cfg.file.bulk_detection_overrides.contains_key("markdown"));

        cfg.set_override("markdown", ThresholdKey::MaxRecentSize, None);
        assert!(!cfg.file.bulk_detection_overrides.contains_key("markdown"));
        assert_eq!(cfg.bulk_detection_for("markdown"), cfg.bulk_detection());

        // Clearing a language with no table is a no-op.
        cfg.set_override("go", ThresholdKey::MaxChanges, None);
        assert!(cfg.file.bulk_detection_overrides.is_empty());
    }

    #[test]
    fn remove_override_reports_presence() {
        let mut cfg = Config::default();
        cfg.set_override("rust", ThresholdKey::MaxChanges, Some(5));
        assert!(cfg.remove_override("rust"));
        assert!(!cfg.remove_override("rust"));
        assert_eq!(cfg.bulk_detection_for("rust").max_changes, 20);
    }

    #[test]
    fn parse_failure_logs_under_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "enabled = [unterminated\n").unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || load_from(Some(tmp.path().to_path_buf()))).unwrap();

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("WARN config:"));
        assert!(log_output.contains("config_parse_failed"));
        assert!(cfg.file.enabled);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn auto_pause_and_notification_sections_parse() {
        let cfg = Config::from_toml_str(
            "[auto_pause]\nenabled = true\ntrigger_count = 3\n[notifications]\nshow_skip_toasts = true\n",
        )
        .unwrap();
        assert!(cfg.file.auto_pause.enabled);
        assert_eq!(cfg.file.auto_pause.trigger_count, 3);
        assert_eq!(cfg.file.auto_pause.duration_ms, 60_000);
        assert!(cfg.file.notifications.show_skip_toasts);
    }
}
