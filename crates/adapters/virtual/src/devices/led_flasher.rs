//! Virtual LED flasher with three LEDs.

use std::sync::Arc;

use serde_json::json;

use devlink_app::services::{CommandHandle, StateStore};
use devlink_domain::command::CommandError;
use devlink_domain::value::Value;

pub const SET_COMMAND: &str = "_ledflasher._set";
pub const TOGGLE_COMMAND: &str = "_ledflasher._toggle";
const LEDS: &str = "_ledflasher._leds";
const LED_COUNT: usize = 3;

#[must_use]
pub fn command_definitions() -> serde_json::Value {
    json!({
        "_ledflasher": {
            "_set": {
                "parameters": {
                    "_led": {"minimum": 1, "maximum": LED_COUNT},
                    "_on": "boolean",
                },
            },
            "_toggle": {
                "parameters": {"_led": {"minimum": 1, "maximum": LED_COUNT}},
            },
        }
    })
}

#[must_use]
pub fn state_definitions() -> serde_json::Value {
    json!({
        "_ledflasher": {
            "_leds": {"items": "boolean", "default": [false, false, false]},
        }
    })
}

/// A simulated strip of LEDs whose on/off status lives in device state.
pub struct VirtualLedFlasher {
    state: Arc<StateStore>,
}

impl VirtualLedFlasher {
    #[must_use]
    pub fn new(state: Arc<StateStore>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    pub fn handle_set(&self, command: &CommandHandle) {
        tracing::info!(id = %command.id(), name = command.name(), "received command");
        let Some(index) = led_index(command) else {
            return;
        };
        let Some(on) = command.parameter("_on").and_then(Value::as_bool) else {
            abort(command, "invalid_parameter_value", "LED state is missing");
            return;
        };
        self.update(command, |leds| {
            if leds[index] == on {
                false
            } else {
                leds[index] = on;
                true
            }
        });
    }

    pub fn handle_toggle(&self, command: &CommandHandle) {
        tracing::info!(id = %command.id(), name = command.name(), "received command");
        let Some(index) = led_index(command) else {
            return;
        };
        self.update(command, |leds| {
            leds[index] = !leds[index];
            true
        });
    }

    /// Current on/off status of every LED.
    #[must_use]
    pub fn leds(&self) -> [bool; LED_COUNT] {
        let mut leds = [false; LED_COUNT];
        if let Some(Value::Array(values)) = self.state.get_property(LEDS) {
            for (led, value) in leds.iter_mut().zip(&values) {
                *led = value.as_bool().unwrap_or(false);
            }
        }
        leds
    }

    /// Apply `change` to the LEDs; when it reports a change the new status
    /// is written back to state. The command completes either way.
    fn update(&self, command: &CommandHandle, change: impl FnOnce(&mut [bool; LED_COUNT]) -> bool) {
        let mut leds = self.leds();
        if change(&mut leds) {
            tracing::info!(leds = ?leds, "LEDs changed");
            if let Err(err) = self.state.set_property(LEDS, json!(leds)) {
                tracing::warn!(error = %err, "cannot update LED state");
                abort(command, err.code(), &err.message());
                return;
            }
        }
        if let Err(err) = command.complete(&json!({})) {
            tracing::warn!(id = %command.id(), error = %err, "cannot complete command");
        }
    }
}

/// Zero-based index of the `_led` parameter. Aborts the command when absent.
fn led_index(command: &CommandHandle) -> Option<usize> {
    let index = command
        .parameter("_led")
        .and_then(Value::as_i64)
        .and_then(|led| usize::try_from(led).ok())
        .filter(|led| (1..=LED_COUNT).contains(led))
        .map(|led| led - 1);
    if index.is_none() {
        abort(command, "invalid_parameter_value", "LED index is missing");
    }
    index
}

fn abort(command: &CommandHandle, code: &str, message: &str) {
    if let Err(err) = command.abort(CommandError::new(code, message)) {
        tracing::warn!(id = %command.id(), error = %err, "cannot abort command");
    }
}
