//! In-memory pipeline configuration and per-stage snapshots.

use serde::Serialize;
use toml::{Table, Value};

use super::settings::{default_sections, ConfigSection};

/// Recursively merge `overrides` into a copy of `base`.
///
/// Tables present on both sides are merged key by key; any other value in
/// `overrides` replaces the base value outright (arrays are not
/// concatenated). Keys only present in `overrides` are added.
pub fn deep_merge(base: &Table, overrides: &Table) -> Table {
    let mut merged = base.clone();
    for (key, value) in overrides {
        let replacement = match (merged.get(key), value) {
            (Some(Value::Table(existing)), Value::Table(update)) => {
                Value::Table(deep_merge(existing, update))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), replacement);
    }
    merged
}

/// Complete configuration: one table per section.
///
/// Never mutated by a run; [`PipelineConfig::merged`] returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    sections: Table,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sections: default_sections(),
        }
    }
}

impl PipelineConfig {
    /// Built-in defaults with `table` layered on top.
    pub fn from_table(table: Table) -> Self {
        Self {
            sections: deep_merge(&default_sections(), &table),
        }
    }

    /// A new config with `overrides` deep-merged over this one.
    pub fn merged(&self, overrides: &Table) -> Self {
        Self {
            sections: deep_merge(&self.sections, overrides),
        }
    }

    /// Snapshot of one section. Missing sections yield an empty snapshot.
    pub fn section(&self, name: &str) -> StageConfig {
        let values = self
            .sections
            .get(name)
            .and_then(Value::as_table)
            .cloned()
            .unwrap_or_default();
        StageConfig {
            section: name.to_string(),
            values,
        }
    }

    /// Snapshot of a known section.
    pub fn get_section(&self, section: ConfigSection) -> StageConfig {
        self.section(section.table_name())
    }

    /// Set one key, creating the section table if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<Value>) {
        let entry = self
            .sections
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(table) = entry {
            table.insert(key.to_string(), value.into());
        }
    }

    /// Remove one key. Returns the removed value, if any.
    pub fn remove(&mut self, section: &str, key: &str) -> Option<Value> {
        self.sections
            .get_mut(section)
            .and_then(Value::as_table_mut)
            .and_then(|table| table.remove(key))
    }

    /// The raw section tables.
    pub fn as_table(&self) -> &Table {
        &self.sections
    }
}

/// Immutable view of one config section handed to a stage.
///
/// Accessors fall back to the given default when a key is missing or has
/// the wrong type. Integers are accepted where floats are expected.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StageConfig {
    section: String,
    values: Table,
}

impl StageConfig {
    /// Build a snapshot directly from a table.
    pub fn new(section: impl Into<String>, values: Table) -> Self {
        Self {
            section: section.into(),
            values,
        }
    }

    /// Section name this snapshot was taken from.
    pub fn name(&self) -> &str {
        &self.section
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(Value::Float(f)) => *f,
            Some(Value::Integer(i)) => *i as f64,
            _ => default,
        }
    }

    pub fn integer(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Float(f)) if f.fract() == 0.0 => *f as i64,
            _ => default,
        }
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// String value, treating a missing key or an empty string as unset.
    pub fn optional_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    /// A new snapshot with `key` set. The receiver is unchanged.
    pub fn with(&self, key: &str, value: impl Into<Value>) -> Self {
        let mut values = self.values.clone();
        values.insert(key.to_string(), value.into());
        Self {
            section: self.section.clone(),
            values,
        }
    }

    /// A new snapshot without `key`.
    pub fn without(&self, key: &str) -> Self {
        let mut values = self.values.clone();
        values.remove(key);
        Self {
            section: self.section.clone(),
            values,
        }
    }

    /// The raw table.
    pub fn as_table(&self) -> &Table {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn merge_recurses_into_tables() {
        let base = table("[audio]\ntarget_loudness_lufs = -16.0\nhighpass_hz = 80\n");
        let over = table("[audio]\ntarget_loudness_lufs = -14.0\n");
        let merged = deep_merge(&base, &over);

        let audio = merged["audio"].as_table().unwrap();
        assert_eq!(audio["target_loudness_lufs"].as_float(), Some(-14.0));
        assert_eq!(audio["highpass_hz"].as_integer(), Some(80));
    }

    #[test]
    fn merge_replaces_arrays_and_scalars() {
        let base = table("tags = [\"a\", \"b\"]\n[video]\ncrf = 18\n");
        let over = table("tags = [\"c\"]\nvideo = 3\n");
        let merged = deep_merge(&base, &over);

        assert_eq!(merged["tags"].as_array().unwrap().len(), 1);
        assert_eq!(merged["video"].as_integer(), Some(3));
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let config = PipelineConfig::default();
        assert_eq!(config.merged(&Table::new()), config);
    }

    #[test]
    fn merge_is_idempotent() {
        let config = PipelineConfig::default();
        let over = table("[thumbnails]\ncount = 3\n[pipeline]\nfail_fast = true\n");
        let once = config.merged(&over);
        let twice = once.merged(&over);
        assert_eq!(once, twice);
    }

    #[test]
    fn merged_leaves_base_untouched() {
        let base = PipelineConfig::default();
        let before = base.clone();
        let _ = base.merged(&table("[video]\ncrf = 30\n"));
        assert_eq!(base, before);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = PipelineConfig::from_table(table("[thumbnails]\ncount = 2\n"));
        let thumbs = config.get_section(ConfigSection::Thumbnails);
        assert_eq!(thumbs.integer("count", 6), 2);
        assert_eq!(thumbs.integer("width", 0), 1280);
    }

    #[test]
    fn snapshot_accessors_fall_back() {
        let snap = StageConfig::new(
            "video",
            table("crf = 20\nbrightness = 1\nlut_path = \"\"\nname = \"x\"\n"),
        );
        assert_eq!(snap.integer("crf", 18), 20);
        assert_eq!(snap.float("brightness", 0.0), 1.0);
        assert_eq!(snap.bool("crf", true), true);
        assert_eq!(snap.optional_string("lut_path"), None);
        assert_eq!(snap.optional_string("name"), Some("x".to_string()));
        assert_eq!(snap.string("missing", "dflt"), "dflt");
    }

    #[test]
    fn with_builds_new_snapshot() {
        let snap = StageConfig::new("video", Table::new());
        let extended = snap.with("external_audio_path", "/tmp/a.wav");
        assert!(!snap.contains("external_audio_path"));
        assert_eq!(
            extended.optional_string("external_audio_path").as_deref(),
            Some("/tmp/a.wav")
        );
        assert!(!extended.without("external_audio_path").contains("external_audio_path"));
    }

    #[test]
    fn set_and_remove_keys() {
        let mut config = PipelineConfig::default();
        config.set("video", "external_audio_path", "x.wav");
        assert!(config.section("video").contains("external_audio_path"));
        assert!(config.remove("video", "external_audio_path").is_some());
        assert!(config.remove("video", "external_audio_path").is_none());
        config.set("custom", "k", 1);
        assert_eq!(config.section("custom").integer("k", 0), 1);
    }
}
