//! Settings-specific error type wrapping IO errors.

use std::path::PathBuf;

use devlink_domain::error::DevlinkError;

/// Errors originating from the file settings layer.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings directory could not be created.
    #[error("cannot create settings directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file could not be read.
    #[error("cannot read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file could not be written.
    #[error("cannot write settings file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings name cannot be used as part of a file name.
    #[error("invalid settings name '{0}'")]
    InvalidName(String),
}

impl From<SettingsError> for DevlinkError {
    fn from(err: SettingsError) -> Self {
        Self::Storage(Box::new(err))
    }
}
