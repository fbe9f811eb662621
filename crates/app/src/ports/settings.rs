//! Settings port: persistence of opaque named blobs.
//!
//! The core stores declarative JSON (base command definitions, the state
//! snapshot) under a short name and parses it itself; a provider only moves
//! bytes.

use devlink_domain::error::DevlinkError;

/// Loads and saves named settings blobs.
pub trait SettingsStore: Send + Sync {
    /// Load the blob stored under `name`, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`DevlinkError::Storage`] when the backing store cannot be read.
    fn load(&self, name: &str) -> Result<Option<String>, DevlinkError>;

    /// Replace the blob stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DevlinkError::Storage`] when the backing store cannot be written.
    fn save(&self, name: &str, blob: &str) -> Result<(), DevlinkError>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for std::sync::Arc<T> {
    fn load(&self, name: &str) -> Result<Option<String>, DevlinkError> {
        (**self).load(name)
    }

    fn save(&self, name: &str, blob: &str) -> Result<(), DevlinkError> {
        (**self).save(name, blob)
    }
}
