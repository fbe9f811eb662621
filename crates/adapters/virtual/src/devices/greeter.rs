//! Virtual greeter: `_greeter._greet` says hello `_count` times, one greeting
//! per scheduler tick, then completes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use devlink_app::ports::TaskScheduler;
use devlink_app::services::{CommandHandle, StateStore};
use devlink_domain::command::{CommandError, CommandState};
use devlink_domain::value::Value;

pub const COMMAND: &str = "_greeter._greet";
const COUNTER: &str = "_greeter._greetings_counter";

/// Command definitions of the `_greeter` package.
#[must_use]
pub fn command_definitions() -> serde_json::Value {
    json!({
        "_greeter": {
            "_greet": {
                "minimalRole": "user",
                "parameters": {
                    "_name": "string",
                    "_count": {"minimum": 1, "maximum": 100, "default": 1},
                },
                "progress": {"_todo": "integer"},
                "results": {"_greeting": "string"},
            }
        }
    })
}

/// State schema of the `_greeter` package.
#[must_use]
pub fn state_definitions() -> serde_json::Value {
    json!({"_greeter": {"_greetings_counter": {"type": "integer", "default": 0}}})
}

/// A simulated device greeting people.
pub struct VirtualGreeter {
    state: Arc<StateStore>,
    scheduler: Arc<dyn TaskScheduler>,
    interval: Duration,
}

impl VirtualGreeter {
    #[must_use]
    pub fn new(
        state: Arc<StateStore>,
        scheduler: Arc<dyn TaskScheduler>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            scheduler,
            interval,
        })
    }

    /// Entry point for a freshly dispatched `_greet` command.
    pub fn handle(self: &Arc<Self>, command: CommandHandle) {
        tracing::info!(id = %command.id(), name = command.name(), "received command");
        let Some(name) = command
            .parameter("_name")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            abort(&command, "Name is missing");
            return;
        };
        let todo = command
            .parameter("_count")
            .and_then(Value::as_i64)
            .unwrap_or(1);
        self.step(command, name, todo);
    }

    fn step(self: &Arc<Self>, command: CommandHandle, name: String, mut todo: i64) {
        if command.state().is_none_or(CommandState::is_terminal) {
            tracing::debug!(id = %command.id(), "command no longer live, stop greeting");
            return;
        }

        if todo > 0 {
            todo -= 1;
            tracing::info!("Hello {name}");
            if let Err(err) = command.set_progress(&json!({"_todo": todo})) {
                tracing::warn!(id = %command.id(), error = %err, "cannot report progress");
                return;
            }
            self.count_greeting();
        }

        if todo > 0 {
            let this = Arc::clone(self);
            self.scheduler.post(
                self.interval,
                Box::new(move || this.step(command, name, todo)),
            );
            return;
        }

        match command.complete(&json!({"_greeting": format!("Hello {name}")})) {
            Ok(()) => tracing::info!(id = %command.id(), "greeting finished"),
            Err(err) => tracing::warn!(id = %command.id(), error = %err, "cannot complete greeting"),
        }
    }

    fn count_greeting(&self) {
        let counter = self
            .state
            .get_property(COUNTER)
            .and_then(|value| value.as_i64())
            .unwrap_or(0);
        if let Err(err) = self.state.set_property(COUNTER, json!(counter + 1)) {
            tracing::warn!(error = %err, "cannot update greetings counter");
        }
    }
}

fn abort(command: &CommandHandle, message: &str) {
    if let Err(err) = command.abort(CommandError::new("invalid_parameter_value", message)) {
        tracing::warn!(id = %command.id(), error = %err, "cannot abort command");
    }
}
