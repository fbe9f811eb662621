//! # devlink-adapter-settings-file
//!
//! Implements the [`SettingsStore`](devlink_app::ports::SettingsStore) port
//! on top of plain files.
//!
//! Each settings name maps to one file in a configured directory:
//! `<dir>/devlink_settings_<model_id>.json` for the unnamed blob and
//! `<dir>/devlink_settings_<model_id>_<name>.json` otherwise. The directory
//! is created on first save.
//!
//! ## Dependency rule
//!
//! Depends on `devlink-app` (port traits) and `devlink-domain` only.

mod error;
mod store;

pub use error::SettingsError;
pub use store::{Config, FileSettingsStore};
