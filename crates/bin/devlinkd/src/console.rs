//! Line-oriented JSON console on stdin/stdout.
//!
//! Each input line is one request:
//!
//! - `{"name": "pkg.cmd", "parameters": {…}, "role": "owner"}` dispatches a
//!   command (`role` defaults to `user`) and answers with the instance;
//! - `{"get": "<command id>"}` answers with that instance and
//!   `{"discard": "<command id>"}` releases a finished one;
//! - `{"query": "state"}` / `{"query": "commands"}` answer with the state
//!   snapshot or the command definitions.
//!
//! Failures answer with `{"code", "message"}`.
//!
//! The console holds the handle of every command it dispatched until that
//! command is discarded, so finished commands stay visible to `get`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use devlink_app::services::{CommandHandle, Device};
use devlink_domain::error::{DevlinkError, DispatchError};
use devlink_domain::id::CommandId;
use devlink_domain::role::Role;

/// Serve stdin requests until input closes.
pub async fn run(device: Arc<Device>) {
    let mut console = Console::new(device);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("console input closed");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot read console input");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let mut reply = console.handle_line(&line).to_string();
        reply.push('\n');
        let written = async {
            stdout.write_all(reply.as_bytes()).await?;
            stdout.flush().await
        };
        if let Err(err) = written.await {
            tracing::warn!(error = %err, "cannot write console reply");
            return;
        }
    }
}

/// One console session over a device.
pub struct Console {
    device: Arc<Device>,
    handles: BTreeMap<CommandId, CommandHandle>,
}

impl Console {
    #[must_use]
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            handles: BTreeMap::new(),
        }
    }

    /// Answer one console request.
    pub fn handle_line(&mut self, line: &str) -> Json {
        match serde_json::from_str::<Json>(line) {
            Ok(request) => self
                .handle_request(&request)
                .unwrap_or_else(|err| err.to_json()),
            Err(err) => malformed(format!("request is not valid JSON: {err}")).to_json(),
        }
    }

    fn handle_request(&mut self, request: &Json) -> Result<Json, DevlinkError> {
        if let Some(query) = request.get("query") {
            return match query.as_str() {
                Some("state") => Ok(self.device.state()),
                Some("commands") => Ok(self.device.commands_as_json(|_| true, false)),
                _ => Err(malformed(format!("unknown query {query}"))),
            };
        }

        if let Some(id) = request.get("get") {
            let id = command_id(id)?;
            return self
                .device
                .dispatcher()
                .get(id)
                .ok_or_else(|| malformed(format!("no command with id {id}")));
        }

        if let Some(id) = request.get("discard") {
            let id = command_id(id)?;
            self.device.dispatcher().discard(id)?;
            self.handles.remove(&id);
            return Ok(serde_json::json!({"discarded": id.to_string()}));
        }

        let role = match request.get("role") {
            Some(role) => role
                .as_str()
                .ok_or_else(|| malformed(format!("invalid role {role}")))?
                .parse::<Role>()
                .map_err(|err| malformed(err.to_string()))?,
            None => Role::default(),
        };
        let handle = self.device.add_command(request, role)?;
        let reply = handle
            .to_json()
            .unwrap_or_else(|| serde_json::json!({"id": handle.id().to_string()}));
        self.handles.insert(handle.id(), handle);
        Ok(reply)
    }
}

fn command_id(id: &Json) -> Result<CommandId, DevlinkError> {
    id.as_str()
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| malformed(format!("invalid command id {id}")))
}

fn malformed(message: String) -> DevlinkError {
    DispatchError::MalformedRequest(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use devlink_adapter_virtual::VirtualIntegration;
    use devlink_app::event_bus::InProcessEventBus;
    use devlink_app::ports::{Integration, Task, TaskScheduler};
    use devlink_domain::schema::BuildOptions;
    use serde_json::json;

    struct InlineScheduler;

    impl TaskScheduler for InlineScheduler {
        fn post(&self, _delay: Duration, task: Task) {
            task();
        }
    }

    fn make_console() -> Console {
        let device = Device::new(Arc::new(InProcessEventBus::new(8)), BuildOptions::default());
        VirtualIntegration::new(Arc::new(InlineScheduler))
            .setup(&device)
            .unwrap();
        Console::new(Arc::new(device))
    }

    #[test]
    fn should_dispatch_command_and_answer_with_instance() {
        let mut console = make_console();
        let reply = console.handle_line(
            r#"{"name":"_greeter._greet","parameters":{"_name":"Sam","_count":2}}"#,
        );
        assert_eq!(reply["state"], json!("done"));
        assert_eq!(reply["results"], json!({"_greeting": "Hello Sam"}));
    }

    #[test]
    fn should_get_command_by_id() {
        let mut console = make_console();
        let reply = console.handle_line(
            r#"{"name":"_ledflasher._toggle","parameters":{"_led":1}}"#,
        );
        let id = reply["id"].as_str().unwrap();

        let found = console.handle_line(&json!({"get": id}).to_string());

        assert_eq!(found, reply);
    }

    #[test]
    fn should_discard_finished_command() {
        let mut console = make_console();
        let reply = console.handle_line(
            r#"{"name":"_ledflasher._toggle","parameters":{"_led":1}}"#,
        );
        let id = reply["id"].as_str().unwrap();

        let discarded = console.handle_line(&json!({"discard": id}).to_string());
        assert_eq!(discarded, json!({"discarded": id}));

        let again = console.handle_line(&json!({"get": id}).to_string());
        assert_eq!(again["code"], json!("invalid_command_request"));
    }

    #[test]
    fn should_answer_state_query() {
        let mut console = make_console();
        let reply = console.handle_line(r#"{"query":"state"}"#);
        assert_eq!(reply["_ledflasher"]["_leds"], json!([false, false, false]));
    }

    #[test]
    fn should_answer_commands_query() {
        let mut console = make_console();
        let reply = console.handle_line(r#"{"query":"commands"}"#);
        assert!(reply["_greeter"]["_greet"].is_object());
    }

    #[test]
    fn should_answer_fault_for_invalid_json() {
        let mut console = make_console();
        let reply = console.handle_line("{oops");
        assert_eq!(reply["code"], json!("invalid_command_request"));
    }

    #[test]
    fn should_answer_fault_for_unknown_role() {
        let mut console = make_console();
        let reply = console.handle_line(
            r#"{"name":"_ledflasher._toggle","parameters":{"_led":1},"role":"admin"}"#,
        );
        assert_eq!(reply["code"], json!("invalid_command_request"));
    }

    #[test]
    fn should_answer_fault_for_insufficient_role() {
        let mut console = make_console();
        let reply = console.handle_line(
            r#"{"name":"_greeter._greet","parameters":{"_name":"Sam"},"role":"viewer"}"#,
        );
        assert_eq!(reply["code"], json!("access_denied"));
    }

    #[test]
    fn should_answer_fault_for_unknown_command() {
        let mut console = make_console();
        let reply = console.handle_line(r#"{"name":"_robot._walk"}"#);
        assert_eq!(reply["code"], json!("unknown_command"));
    }
}
