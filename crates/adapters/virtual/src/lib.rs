//! # devlink-adapter-virtual
//!
//! Virtual/demo integration that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Commands | State |
//! |--------|----------|-------|
//! | Greeter | `_greeter._greet` | `_greeter._greetings_counter` |
//! | LED flasher | `_ledflasher._set`, `_ledflasher._toggle` | `_ledflasher._leds` |
//!
//! Any other dispatched command is aborted with the `unimplemented` code.
//!
//! ## Dependency rule
//!
//! Depends on `devlink-app` (port traits, services) and `devlink-domain` only.

mod devices;

use std::sync::Arc;
use std::time::Duration;

use devlink_app::ports::{Integration, TaskScheduler};
use devlink_app::services::Device;
use devlink_domain::error::DevlinkError;

pub use devices::{VirtualGreeter, VirtualLedFlasher};

/// Delay between two greetings of one `_greet` command.
pub const DEFAULT_GREET_INTERVAL: Duration = Duration::from_secs(1);

/// Virtual integration that installs the simulated devices on a [`Device`].
pub struct VirtualIntegration {
    scheduler: Arc<dyn TaskScheduler>,
    greet_interval: Duration,
}

impl VirtualIntegration {
    #[must_use]
    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            scheduler,
            greet_interval: DEFAULT_GREET_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_greet_interval(mut self, interval: Duration) -> Self {
        self.greet_interval = interval;
        self
    }
}

impl Integration for VirtualIntegration {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn setup(&mut self, device: &Device) -> Result<(), DevlinkError> {
        device.add_command_definitions(&devices::greeter::command_definitions())?;
        device.add_command_definitions(&devices::led_flasher::command_definitions())?;
        device.add_state_definitions(&devices::greeter::state_definitions())?;
        device.add_state_definitions(&devices::led_flasher::state_definitions())?;

        let greeter = VirtualGreeter::new(
            Arc::clone(device.state_store()),
            Arc::clone(&self.scheduler),
            self.greet_interval,
        );
        device.add_command_handler(devices::greeter::COMMAND, move |command| {
            greeter.handle(command);
        });

        let flasher = VirtualLedFlasher::new(Arc::clone(device.state_store()));
        let set = Arc::clone(&flasher);
        device.add_command_handler(devices::led_flasher::SET_COMMAND, move |command| {
            set.handle_set(&command);
        });
        device.add_command_handler(devices::led_flasher::TOGGLE_COMMAND, move |command| {
            flasher.handle_toggle(&command);
        });

        device.set_fallback_handler(devices::unhandled);
        tracing::info!(integration = self.name(), "virtual devices installed");
        Ok(())
    }
}
