//! Event: an immutable record of something that happened.
//!
//! Events are produced when a command instance is queued or moves through
//! its lifecycle, and when the device state changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{CommandId, EventId};
use crate::time::Timestamp;

/// What an [`Event`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CommandQueued,
    CommandProgress,
    CommandCompleted,
    CommandAborted,
    StateChanged,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandQueued => "command_queued",
            Self::CommandProgress => "command_progress",
            Self::CommandCompleted => "command_completed",
            Self::CommandAborted => "command_aborted",
            Self::StateChanged => "state_changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification published on the event bus.
///
/// `data` carries the rendered command instance for command events and the
/// full state snapshot for [`EventType::StateChanged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub command_id: Option<CommandId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(
        event_type: EventType,
        command_id: Option<CommandId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            command_id,
            data,
            timestamp: crate::time::now(),
        }
    }
}
