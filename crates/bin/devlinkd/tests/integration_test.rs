//! End-to-end smoke tests for the full devlinkd stack.
//!
//! Each test wires the complete device (real event bus, real tokio
//! scheduler, virtual integration, file-backed settings) and drives it the
//! way remote actors do, through command requests and bus events.

use std::sync::Arc;
use std::time::Duration;

use devlink_adapter_settings_file::Config;
use devlink_adapter_virtual::VirtualIntegration;
use devlink_app::event_bus::InProcessEventBus;
use devlink_app::ports::{Integration, SettingsStore};
use devlink_app::scheduler::TokioTaskScheduler;
use devlink_app::services::Device;
use devlink_domain::command::CommandState;
use devlink_domain::event::{Event, EventType};
use devlink_domain::role::Role;
use devlink_domain::schema::BuildOptions;
use serde_json::json;
use tokio::sync::broadcast;

struct Stack {
    device: Device,
    events: broadcast::Receiver<Event>,
    runner: tokio::task::JoinHandle<()>,
}

fn stack() -> Stack {
    let bus = InProcessEventBus::new(256);
    let events = bus.subscribe();
    let device = Device::new(Arc::new(bus), BuildOptions::default())
        .with_base_commands(&json!({
            "base": {
                "reboot": {"minimalRole": "owner", "parameters": {}},
                "identify": {"minimalRole": "user", "parameters": {}},
            }
        }))
        .expect("base commands should load");
    let (scheduler, runner) = TokioTaskScheduler::channel();
    VirtualIntegration::new(Arc::new(scheduler))
        .with_greet_interval(Duration::from_millis(2))
        .setup(&device)
        .expect("virtual integration should set up");
    Stack {
        device,
        events,
        runner: tokio::spawn(runner.run()),
    }
}

async fn next_event(events: &mut broadcast::Receiver<Event>, event_type: EventType) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("bus should stay open");
            if event.event_type == event_type {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive in time")
}

// ---------------------------------------------------------------------------
// Greeter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_greet_with_progress_and_state_updates() {
    let mut stack = stack();

    let handle = stack
        .device
        .add_command(
            &json!({"name": "_greeter._greet", "parameters": {"_name": "Ada", "_count": 2}}),
            Role::Owner,
        )
        .unwrap();

    let queued = next_event(&mut stack.events, EventType::CommandQueued).await;
    assert_eq!(queued.command_id, Some(handle.id()));
    assert_eq!(queued.data["state"], json!("queued"));

    let progress = next_event(&mut stack.events, EventType::CommandProgress).await;
    assert_eq!(progress.data["progress"], json!({"_todo": 1}));

    let completed = next_event(&mut stack.events, EventType::CommandCompleted).await;
    assert_eq!(completed.data["results"], json!({"_greeting": "Hello Ada"}));
    assert_eq!(handle.state(), Some(CommandState::Completed));
    assert_eq!(
        stack.device.state()["_greeter"]["_greetings_counter"],
        json!(2)
    );

    stack.runner.abort();
}

#[tokio::test]
async fn should_reject_greeting_out_of_range_without_queueing() {
    let stack = stack();

    let err = stack
        .device
        .add_command(
            &json!({"name": "_greeter._greet", "parameters": {"_name": "Ada", "_count": 101}}),
            Role::User,
        )
        .unwrap_err();

    assert_eq!(err.code(), "invalid_parameter_value");
    assert!(stack.device.dispatcher().pending().is_empty());
    stack.runner.abort();
}

// ---------------------------------------------------------------------------
// LED flasher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_publish_state_change_for_led_toggle() {
    let mut stack = stack();

    stack
        .device
        .add_command(
            &json!({"name": "_ledflasher._toggle", "parameters": {"_led": 2}}),
            Role::User,
        )
        .unwrap();

    let changed = next_event(&mut stack.events, EventType::StateChanged).await;
    assert_eq!(changed.command_id, None);
    assert_eq!(changed.data["_ledflasher"]["_leds"], json!([false, true, false]));
    stack.runner.abort();
}

// ---------------------------------------------------------------------------
// Base commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_abort_base_command_without_handler() {
    let mut stack = stack();
    stack
        .device
        .add_command_definitions(&json!({"base": {"identify": {}}}))
        .unwrap();

    let handle = stack
        .device
        .add_command(&json!({"name": "base.identify"}), Role::User)
        .unwrap();

    let aborted = next_event(&mut stack.events, EventType::CommandAborted).await;
    assert_eq!(aborted.command_id, Some(handle.id()));
    assert_eq!(aborted.data["error"]["code"], json!("unimplemented"));
    stack.runner.abort();
}

#[tokio::test]
async fn should_enforce_minimal_role_of_base_command() {
    let stack = stack();
    stack
        .device
        .add_command_definitions(&json!({"base": {"reboot": {}}}))
        .unwrap();

    let err = stack
        .device
        .add_command(&json!({"name": "base.reboot"}), Role::Manager)
        .unwrap_err();

    assert_eq!(err.code(), "access_denied");
    stack.runner.abort();
}

#[tokio::test]
async fn should_reject_custom_command_outside_vendor_namespace() {
    let stack = stack();

    let err = stack
        .device
        .add_command_definitions(&json!({"robot": {"jump": {}}}))
        .unwrap_err();

    assert_eq!(err.code(), "invalid_property_definition");
    stack.runner.abort();
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_restore_state_saved_to_settings_file() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = Config {
        dir: tmp.path().to_path_buf(),
        model_id: "TEST1".to_string(),
    }
    .build();

    let first = stack();
    first
        .device
        .add_command(
            &json!({"name": "_ledflasher._set", "parameters": {"_led": 3, "_on": true}}),
            Role::User,
        )
        .unwrap();
    settings
        .save("state", &first.device.state().to_string())
        .unwrap();
    first.runner.abort();

    let second = stack();
    let blob = settings.load("state").unwrap().unwrap();
    second
        .device
        .set_state_properties(&serde_json::from_str(&blob).unwrap())
        .unwrap();

    assert_eq!(
        second.device.state()["_ledflasher"]["_leds"],
        json!([false, false, true])
    );
    second.runner.abort();
}
