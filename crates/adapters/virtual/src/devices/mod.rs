pub mod greeter;
pub mod led_flasher;

pub use greeter::VirtualGreeter;
pub use led_flasher::VirtualLedFlasher;

use devlink_app::services::CommandHandle;
use devlink_domain::command::CommandError;

/// Wildcard handler: anything no virtual device implements is aborted.
pub fn unhandled(command: CommandHandle) {
    tracing::warn!(id = %command.id(), name = command.name(), "unimplemented command");
    let error = CommandError::new(
        "unimplemented",
        format!("command '{}' is not implemented", command.name()),
    );
    if let Err(err) = command.abort(error) {
        tracing::warn!(id = %command.id(), error = %err, "cannot abort command");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use devlink_app::ports::{EventPublisher, Task, TaskScheduler};
    use devlink_app::services::Device;
    use devlink_domain::error::DevlinkError;
    use devlink_domain::event::Event;
    use devlink_domain::schema::BuildOptions;
    use serde_json::json;

    use super::*;

    // ── Spy publisher ──

    #[derive(Default)]
    pub(crate) struct SpyPublisher {
        events: Mutex<Vec<Event>>,
    }

    impl SpyPublisher {
        pub(crate) fn count(&self, event_type: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|event| event.event_type.as_str() == event_type)
                .count()
        }
    }

    impl EventPublisher for SpyPublisher {
        fn publish(&self, event: Event) -> Result<(), DevlinkError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    // ── Schedulers ──

    /// Runs every posted task right away, ignoring the delay.
    pub(crate) struct ImmediateScheduler;

    impl TaskScheduler for ImmediateScheduler {
        fn post(&self, _delay: Duration, task: Task) {
            task();
        }
    }

    /// Holds posted tasks until the test runs them.
    #[derive(Default)]
    pub(crate) struct ManualScheduler {
        tasks: Mutex<Vec<Task>>,
    }

    impl ManualScheduler {
        pub(crate) fn run_all(&self) {
            loop {
                let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
                if tasks.is_empty() {
                    return;
                }
                for task in tasks {
                    task();
                }
            }
        }
    }

    impl TaskScheduler for ManualScheduler {
        fn post(&self, _delay: Duration, task: Task) {
            self.tasks.lock().unwrap().push(task);
        }
    }

    pub(crate) fn make_device() -> (Device, Arc<SpyPublisher>) {
        let spy = Arc::new(SpyPublisher::default());
        let device = Device::new(spy.clone(), BuildOptions::default());
        for definitions in [
            greeter::command_definitions(),
            led_flasher::command_definitions(),
        ] {
            device.add_command_definitions(&definitions).unwrap();
        }
        for definitions in [greeter::state_definitions(), led_flasher::state_definitions()] {
            device.add_state_definitions(&definitions).unwrap();
        }
        (device, spy)
    }

    #[test]
    fn should_abort_unhandled_command_as_unimplemented() {
        let (device, _) = make_device();
        device.set_fallback_handler(unhandled);

        let handle = device
            .add_command(
                &json!({"name": "_ledflasher._toggle", "parameters": {"_led": 1}}),
                devlink_domain::role::Role::User,
            )
            .unwrap();

        let snapshot = handle.to_json().unwrap();
        assert_eq!(snapshot["state"], json!("aborted"));
        assert_eq!(snapshot["error"]["code"], json!("unimplemented"));
    }
}
