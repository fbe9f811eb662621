//! File-per-name settings store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use devlink_app::ports::SettingsStore;
use devlink_domain::error::DevlinkError;

use crate::error::SettingsError;

/// Configuration for the file settings adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the settings files.
    pub dir: PathBuf,
    /// Model identifier, part of every file name.
    pub model_id: String,
}

impl Config {
    /// Build a [`FileSettingsStore`] from this configuration.
    #[must_use]
    pub fn build(self) -> FileSettingsStore {
        FileSettingsStore { config: self }
    }
}

/// Stores each named blob in its own JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    config: Config,
}

impl FileSettingsStore {
    /// Directory holding the settings files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// File backing the blob stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidName`] when `name` contains a path
    /// separator or starts with a dot.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SettingsError> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(SettingsError::InvalidName(name.to_string()));
        }
        let mut file_name = format!("devlink_settings_{}", self.config.model_id);
        if !name.is_empty() {
            file_name.push('_');
            file_name.push_str(name);
        }
        file_name.push_str(".json");
        Ok(self.config.dir.join(file_name))
    }

    fn read(&self, name: &str) -> Result<Option<String>, SettingsError> {
        let path = self.path_for(name)?;
        match std::fs::read_to_string(&path) {
            Ok(blob) => {
                tracing::debug!(path = %path.display(), bytes = blob.len(), "settings loaded");
                Ok(Some(blob))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file yet");
                Ok(None)
            }
            Err(source) => Err(SettingsError::Read { path, source }),
        }
    }

    fn write(&self, name: &str, blob: &str) -> Result<(), SettingsError> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.config.dir).map_err(|source| SettingsError::CreateDir {
            path: self.config.dir.clone(),
            source,
        })?;

        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, blob)
            .and_then(|()| std::fs::rename(&staging, &path))
            .map_err(|source| SettingsError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = blob.len(), "settings saved");
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self, name: &str) -> Result<Option<String>, DevlinkError> {
        Ok(self.read(name)?)
    }

    fn save(&self, name: &str, blob: &str) -> Result<(), DevlinkError> {
        Ok(self.write(name, blob)?)
    }
}
