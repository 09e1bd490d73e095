//! Profile persistence — profile.json
//!
//! One JSON record holding the selected modeset and the value of every
//! option, grouped by kind the same way the settings form groups them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::options::{OptionValue, Preset, Selection};

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("profile I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed profile: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Preset id, empty when none is selected
    #[serde(default)]
    pub modeset: String,
    #[serde(default)]
    pub checkbox_flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub spin_values: BTreeMap<String, i64>,
    #[serde(default)]
    pub line_values: BTreeMap<String, String>,
}

impl ProfileRecord {
    pub fn capture(selection: &Selection) -> Self {
        let mut record = Self {
            modeset: selection.preset.map(|p| p.id.to_string()).unwrap_or_default(),
            ..Default::default()
        };
        for (spec, value) in selection.options.iter() {
            let flag = spec.flag.to_string();
            match value {
                OptionValue::Flag(b) => {
                    record.checkbox_flags.insert(flag, *b);
                }
                OptionValue::Integer(n) => {
                    record.spin_values.insert(flag, *n);
                }
                OptionValue::Text(s) => {
                    record.line_values.insert(flag, s.clone());
                }
            }
        }
        record
    }

    /// Rebuild the selection: preset first, then the stored values on top.
    /// Unknown flags and kind mismatches are skipped.
    pub fn restore(&self) -> Selection {
        let preset = Preset::lookup(&self.modeset);
        if preset.is_none() && !self.modeset.is_empty() {
            tracing::warn!("Profile names unknown modeset '{}', ignoring it", self.modeset);
        }

        let mut selection = Selection::default();
        selection.select_preset(preset);

        let stored = self
            .checkbox_flags
            .iter()
            .map(|(k, v)| (k, OptionValue::Flag(*v)))
            .chain(self.spin_values.iter().map(|(k, v)| (k, OptionValue::Integer(*v))))
            .chain(self.line_values.iter().map(|(k, v)| (k, OptionValue::Text(v.clone()))));

        for (flag, value) in stored {
            if let Err(e) = selection.options.set(flag, value) {
                tracing::warn!("Skipping profile entry: {}", e);
            }
        }
        selection
    }
}

pub struct ProfileStore {
    file_path: PathBuf,
}

impl ProfileStore {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// `Ok(None)` when no profile has been saved yet.
    pub fn load(&self) -> Result<Option<ProfileRecord>, ProfileError> {
        if !self.file_path.exists() {
            tracing::info!("No profile at {}, using defaults", self.file_path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path)?;
        let record: ProfileRecord = serde_json::from_str(&content)?;
        tracing::info!("Loaded profile from {}", self.file_path.display());
        Ok(Some(record))
    }

    pub fn save(&self, record: &ProfileRecord) -> Result<(), ProfileError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&self.file_path, content)?;
        tracing::info!("Saved profile to {}", self.file_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ProfileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ProfileError::Parse(_)));
    }

    #[test]
    fn save_then_load_restores_selection() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path().join("nested").join("profile.json"));

        let mut selection = Selection::default();
        selection.options.set("-q", true).unwrap();
        selection.options.set("-e", 40).unwrap();
        selection.options.set("--dns-addr", "77.88.8.8").unwrap();
        store.save(&ProfileRecord::capture(&selection)).unwrap();

        let restored = store.load().unwrap().unwrap().restore();
        assert_eq!(restored, selection);
    }

    #[test]
    fn restore_applies_preset_then_stored_values() {
        let record = ProfileRecord {
            modeset: "-4".to_string(),
            checkbox_flags: [("-q".to_string(), true)].into_iter().collect(),
            ..Default::default()
        };
        let selection = record.restore();

        assert_eq!(selection.preset.map(|p| p.id), Some("-4"));
        assert_eq!(selection.options.get("-p"), Some(&OptionValue::Flag(true)));
        assert_eq!(selection.options.get("-q"), Some(&OptionValue::Flag(true)));
    }

    #[test]
    fn restore_skips_unknown_and_mistyped_entries() {
        let json = r#"{
            "modeset": "-42",
            "checkbox_flags": { "-p": true, "--gone": true },
            "spin_values": { "-p": 3, "-f": 2 },
            "line_values": { "--port": "8080" }
        }"#;
        let record: ProfileRecord = serde_json::from_str(json).unwrap();
        let selection = record.restore();

        assert!(selection.preset.is_none());
        assert_eq!(selection.options.get("-p"), Some(&OptionValue::Flag(true)));
        assert_eq!(selection.options.get("-f"), Some(&OptionValue::Integer(2)));
        assert_eq!(selection.options.get("--port"), Some(&OptionValue::Text("8080".into())));
    }

    #[test]
    fn restore_clamps_out_of_range_integers() {
        let record: ProfileRecord =
            serde_json::from_str(r#"{ "spin_values": { "--max-payload": 12000 } }"#).unwrap();
        let selection = record.restore();

        assert_eq!(selection.options.get("--max-payload"), Some(&OptionValue::Integer(9999)));
        assert_eq!(
            selection.argv("goodbyedpi.exe"),
            vec!["goodbyedpi.exe", "--max-payload", "9999"]
        );
    }

    #[test]
    fn partial_record_uses_defaults() {
        let record: ProfileRecord = serde_json::from_str(r#"{ "modeset": "-1" }"#).unwrap();
        assert_eq!(record.modeset, "-1");
        assert!(record.spin_values.is_empty());
    }
}
