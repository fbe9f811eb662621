//! Integration port: plugging device behaviour into a [`Device`].
//!
//! An integration owns one or more command packages: it loads their
//! definitions and state schema into the device and registers the handlers
//! that drive dispatched command instances.

use devlink_domain::error::DevlinkError;

use crate::services::Device;

/// A pluggable device integration.
///
/// Implementations live in adapter crates (e.g. `devlink-adapter-virtual`).
/// The binary crate calls [`setup`](Self::setup) once at startup and
/// [`teardown`](Self::teardown) on graceful shutdown.
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"virtual"`).
    fn name(&self) -> &'static str;

    /// Load command and state definitions and register command handlers.
    ///
    /// # Errors
    ///
    /// Returns the first definition or registration error; the device may
    /// then hold only part of this integration's packages.
    fn setup(&mut self, device: &Device) -> Result<(), DevlinkError>;

    /// Called on graceful shutdown. The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn teardown(&mut self) -> Result<(), DevlinkError> {
        Ok(())
    }
}
