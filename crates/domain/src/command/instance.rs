use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::CommandDefinition;
use crate::error::{DevlinkError, LifecycleError, ValidationError};
use crate::id::CommandId;
use crate::schema::ObjectSchema;
use crate::time::Timestamp;
use crate::value::{Value, ValueMap, map_to_json};

/// Lifecycle state of a [`CommandInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandState {
    Queued,
    InProgress,
    #[serde(rename = "done")]
    Completed,
    Aborted,
}

impl CommandState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "inProgress",
            Self::Completed => "done",
            Self::Aborted => "aborted",
        }
    }

    /// `done` and `aborted` have no outgoing transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-supplied failure carried by an aborted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
}

impl CommandError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One invocation of a command.
///
/// An instance only exists with parameters that conform to its definition,
/// and every transition re-checks the current state so that a terminal
/// state is reached at most once.
#[derive(Debug, Clone)]
pub struct CommandInstance {
    id: CommandId,
    definition: Arc<CommandDefinition>,
    parameters: ValueMap,
    state: CommandState,
    progress: Option<ValueMap>,
    results: Option<ValueMap>,
    error: Option<CommandError>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl CommandInstance {
    /// Validate `parameters` and create a queued instance.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first non-conforming
    /// parameter; no instance is created.
    pub fn new(definition: Arc<CommandDefinition>, parameters: &Json) -> Result<Self, ValidationError> {
        let parameters = definition.parameters.validate(parameters)?;
        let now = crate::time::now();
        Ok(Self {
            id: CommandId::new(),
            definition,
            parameters,
            state: CommandState::Queued,
            progress: None,
            results: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn id(&self) -> CommandId {
        self.id
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<CommandDefinition> {
        &self.definition
    }

    /// `package.command`
    #[must_use]
    pub fn name(&self) -> String {
        self.definition.full_name()
    }

    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    #[must_use]
    pub fn parameters(&self) -> &ValueMap {
        &self.parameters
    }

    #[must_use]
    pub fn progress(&self) -> Option<&ValueMap> {
        self.progress.as_ref()
    }

    #[must_use]
    pub fn results(&self) -> Option<&ValueMap> {
        self.results.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&CommandError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Report progress and move to `inProgress`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] from a terminal state, or a
    /// [`ValidationError`] when `progress` does not match the progress schema.
    pub fn set_progress(&mut self, progress: &Json) -> Result<(), DevlinkError> {
        self.ensure_live("set progress on")?;
        let progress = conform(self.definition.progress.as_ref(), progress)?;
        self.progress = Some(progress);
        self.transition(CommandState::InProgress);
        Ok(())
    }

    /// Record results and move to `done`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] from a terminal state, or a
    /// [`ValidationError`] when `results` does not match the results schema.
    pub fn complete(&mut self, results: &Json) -> Result<(), DevlinkError> {
        self.ensure_live("complete")?;
        let results = conform(self.definition.results.as_ref(), results)?;
        self.results = Some(results);
        self.transition(CommandState::Completed);
        Ok(())
    }

    /// Record the failure and move to `aborted`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidState`] from a terminal state.
    pub fn abort(&mut self, error: CommandError) -> Result<(), DevlinkError> {
        self.ensure_live("abort")?;
        self.error = Some(error);
        self.transition(CommandState::Aborted);
        Ok(())
    }

    /// Wire form: `{"id","name","state","parameters","progress","results","error"}`.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut out = serde_json::json!({
            "id": self.id.to_string(),
            "name": self.name(),
            "state": self.state.as_str(),
            "parameters": map_to_json(&self.parameters),
        });
        if let Some(map) = out.as_object_mut() {
            if let Some(progress) = &self.progress {
                map.insert("progress".to_string(), map_to_json(progress));
            }
            if let Some(results) = &self.results {
                map.insert("results".to_string(), map_to_json(results));
            }
            if let Some(error) = &self.error {
                map.insert(
                    "error".to_string(),
                    serde_json::json!({"code": error.code, "message": error.message}),
                );
            }
        }
        out
    }

    fn ensure_live(&self, operation: &'static str) -> Result<(), LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::InvalidState {
                state: self.state,
                operation,
            });
        }
        Ok(())
    }

    fn transition(&mut self, state: CommandState) {
        self.state = state;
        self.updated_at = crate::time::now();
    }
}

/// Validate against `schema` when one is declared; otherwise any object is
/// accepted as-is.
fn conform(schema: Option<&ObjectSchema>, input: &Json) -> Result<ValueMap, ValidationError> {
    match schema {
        Some(schema) => schema.validate(input),
        None => match Value::from_json(input, "")? {
            Value::Object(map) => Ok(map),
            _ => Err(ValidationError::TypeMismatch(String::new())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BuildOptions;
    use serde_json::json;

    fn definition(json: &Json) -> Arc<CommandDefinition> {
        Arc::new(
            CommandDefinition::from_json("_greeter", "_greet", json, None, BuildOptions::default())
                .unwrap(),
        )
    }

    fn greet() -> Arc<CommandDefinition> {
        definition(&json!({
            "parameters": {"_name": "string", "_count": {"minimum": 1, "maximum": 100, "default": 1}},
            "progress": {"_todo": "integer"},
            "results": {"_greeting": "string"},
        }))
    }

    #[test]
    fn should_create_queued_instance_with_defaults_filled_in() {
        let instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        assert_eq!(instance.state(), CommandState::Queued);
        assert_eq!(instance.parameters().get("_count"), Some(&Value::Int(1)));
        assert_eq!(instance.name(), "_greeter._greet");
    }

    #[test]
    fn should_not_create_instance_with_invalid_parameters() {
        let result = CommandInstance::new(greet(), &json!({"_name": "Bob", "_count": 0}));
        assert_eq!(
            result.err(),
            Some(ValidationError::OutOfRange("_count".to_string()))
        );
    }

    #[test]
    fn should_move_to_in_progress_on_progress() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        instance.set_progress(&json!({"_todo": 2})).unwrap();
        instance.set_progress(&json!({"_todo": 1})).unwrap();
        assert_eq!(instance.state(), CommandState::InProgress);
        assert_eq!(instance.progress().and_then(|p| p.get("_todo")), Some(&Value::Int(1)));
    }

    #[test]
    fn should_reject_progress_that_violates_schema() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        let result = instance.set_progress(&json!({"_todo": "many"}));
        assert!(matches!(
            result,
            Err(DevlinkError::Validation(ValidationError::TypeMismatch(path))) if path == "_todo"
        ));
        assert_eq!(instance.state(), CommandState::Queued);
    }

    #[test]
    fn should_complete_straight_from_queued() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        instance.complete(&json!({"_greeting": "Hello Bob"})).unwrap();
        assert_eq!(instance.state(), CommandState::Completed);
    }

    #[test]
    fn should_reject_second_terminal_transition() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        instance.complete(&json!({"_greeting": "Hello Bob"})).unwrap();

        let again = instance.complete(&json!({"_greeting": "Hello again"}));
        assert!(matches!(
            again,
            Err(DevlinkError::Lifecycle(LifecycleError::InvalidState {
                state: CommandState::Completed,
                ..
            }))
        ));
        let abort = instance.abort(CommandError::new("late", "too late"));
        assert!(matches!(abort, Err(DevlinkError::Lifecycle(_))));
        let progress = instance.set_progress(&json!({"_todo": 0}));
        assert!(matches!(progress, Err(DevlinkError::Lifecycle(_))));
        assert_eq!(instance.state(), CommandState::Completed);
        assert!(instance.error().is_none());
    }

    #[test]
    fn should_check_state_before_payload() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        instance.abort(CommandError::new("failed", "boom")).unwrap();
        let result = instance.complete(&json!({"_bogus": 1}));
        assert!(matches!(result, Err(DevlinkError::Lifecycle(_))));
    }

    #[test]
    fn should_accept_any_object_without_declared_schema() {
        let mut instance =
            CommandInstance::new(definition(&json!({})), &json!({})).unwrap();
        instance.set_progress(&json!({"anything": [1, 2]})).unwrap();
        let result = instance.complete(&json!("not an object"));
        assert!(matches!(result, Err(DevlinkError::Validation(_))));
    }

    #[test]
    fn should_reject_oversized_integer_without_declared_schema() {
        let mut instance =
            CommandInstance::new(definition(&json!({})), &json!({})).unwrap();
        let result = instance.set_progress(&json!({"_bytes": u64::MAX}));
        let err = result.unwrap_err();
        assert_eq!(err.code(), "invalid_parameter_value");
        assert!(matches!(
            err,
            DevlinkError::Validation(ValidationError::OutOfRange(path)) if path == "_bytes"
        ));
        assert_eq!(instance.state(), CommandState::Queued);
    }

    #[test]
    fn should_render_wire_form() {
        let mut instance = CommandInstance::new(greet(), &json!({"_name": "Bob"})).unwrap();
        instance.abort(CommandError::new("unimplemented", "no handler")).unwrap();
        let json = instance.to_json();
        assert_eq!(json["id"], json!(instance.id().to_string()));
        assert_eq!(json["name"], json!("_greeter._greet"));
        assert_eq!(json["state"], json!("aborted"));
        assert_eq!(json["parameters"], json!({"_name": "Bob", "_count": 1}));
        assert_eq!(
            json["error"],
            json!({"code": "unimplemented", "message": "no handler"})
        );
        assert!(json.get("results").is_none());
    }

    #[test]
    fn should_serialize_state_names() {
        assert_eq!(serde_json::to_string(&CommandState::Completed).unwrap(), "\"done\"");
        assert_eq!(
            serde_json::to_string(&CommandState::InProgress).unwrap(),
            "\"inProgress\""
        );
    }
}
