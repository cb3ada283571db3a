use super::{Configuration, Setting};
use chrono::Local;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings file does not contain a JSON object")]
    NotAnObject,
    #[error("could not move temporary settings file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Loads and atomically persists the configuration file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration, repairing or recreating the file as needed.
    ///
    /// Never fails: a missing file is created from defaults, an unreadable one
    /// is backed up and replaced, and a partially valid one is merged with the
    /// defaults, backed up and rewritten.
    pub fn load(&self) -> Configuration {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No settings file, writing defaults");
            let config = Configuration::default();
            self.save(&config);
            return config;
        }

        let document = match self.read_document() {
            Ok(document) => document,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Settings unreadable, resetting to defaults");
                self.backup();
                let config = Configuration::default();
                self.save(&config);
                return config;
            },
        };

        let (config, repaired) = Configuration::from_document(document);
        if !repaired.is_empty() {
            warn!(path = %self.path.display(), keys = ?repaired, "Repaired settings keys");
            self.backup();
            self.save(&config);
        }
        config
    }

    /// Persist atomically. Returns false (after logging) on any failure.
    pub fn save(&self, config: &Configuration) -> bool {
        match self.write_atomic(config) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Settings saved");
                true
            },
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to save settings");
                false
            },
        }
    }

    /// Change one field and persist the whole configuration
    pub fn update(&self, config: &mut Configuration, setting: Setting) -> bool {
        config.apply(setting);
        let saved = self.save(config);
        if !saved {
            warn!(key = setting.key(), "Settings change kept in memory only");
        }
        saved
    }

    /// Copy the current file verbatim next to itself with a timestamp suffix
    pub fn backup(&self) -> Option<PathBuf> {
        if !self.path.exists() {
            return None;
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".backup_{}", stamp));
        let backup_path = PathBuf::from(name);

        match fs::copy(&self.path, &backup_path) {
            Ok(_) => {
                info!(backup = %backup_path.display(), "Settings backed up");
                Some(backup_path)
            },
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to back up settings");
                None
            },
        }
    }

    fn read_document(&self) -> Result<serde_json::Map<String, Value>, SettingsError> {
        let text = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    fn write_atomic(&self, config: &Configuration) -> Result<(), SettingsError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut json = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
        serde::Serialize::serialize(config.document(), &mut serializer)?;
        json.push(b'\n');

        // Dropping the temp file on any early return deletes it
        let mut tmp = tempfile::Builder::new()
            .prefix("tmp_settings_")
            .suffix(".json")
            .tempfile_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}
