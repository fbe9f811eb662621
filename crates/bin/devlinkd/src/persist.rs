//! Settings persistence: restores the base commands and device state at
//! startup and writes every state change back.

use std::sync::Arc;

use serde_json::Value as Json;
use tokio::sync::broadcast::{self, error::RecvError};

use devlink_app::ports::SettingsStore;
use devlink_app::services::{Device, StateStore};
use devlink_domain::event::{Event, EventType};

/// Settings name of the base command definitions document.
pub const BASE_COMMANDS: &str = "base_commands";
/// Settings name of the persisted state snapshot.
pub const STATE: &str = "state";

/// Parse the stored base command document, if any.
///
/// # Errors
///
/// Returns an error when the store fails or the blob is not JSON.
pub fn load_base_commands(settings: &dyn SettingsStore) -> anyhow::Result<Option<Json>> {
    let Some(blob) = settings.load(BASE_COMMANDS)? else {
        return Ok(None);
    };
    let document = serde_json::from_str(&blob)?;
    Ok(Some(document))
}

/// Apply the stored state snapshot to `device`.
///
/// A missing, unreadable or non-conforming snapshot is logged and skipped so
/// the device starts from its defaults.
pub fn restore_state(device: &Device, settings: &dyn SettingsStore) {
    let blob = match settings.load(STATE) {
        Ok(Some(blob)) => blob,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, "cannot read saved state");
            return;
        }
    };
    let snapshot: Json = match serde_json::from_str(&blob) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(error = %err, "saved state is not valid JSON, ignoring");
            return;
        }
    };
    match device.set_state_properties(&snapshot) {
        Ok(()) => tracing::info!("device state restored"),
        Err(err) => tracing::warn!(code = err.code(), error = %err.message(), "saved state rejected, ignoring"),
    }
}

/// Save the state snapshot carried by each [`EventType::StateChanged`] event
/// until the event bus closes.
pub async fn run(
    mut events: broadcast::Receiver<Event>,
    state: Arc<StateStore>,
    settings: Arc<dyn SettingsStore>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.event_type == EventType::StateChanged => {
                save(settings.as_ref(), &event.data);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "persister lagged behind, saving current state");
                save(settings.as_ref(), &state.state());
            }
            Err(RecvError::Closed) => {
                tracing::debug!("event bus closed, persister stopping");
                return;
            }
        }
    }
}

fn save(settings: &dyn SettingsStore, snapshot: &Json) {
    match settings.save(STATE, &snapshot.to_string()) {
        Ok(()) => tracing::debug!("device state saved"),
        Err(err) => tracing::error!(error = %err.message(), "cannot save device state"),
    }
}
