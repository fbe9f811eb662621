//! Common error types used across the workspace.
//!
//! Each concern owns a typed error enum; [`DevlinkError`] wraps them all via
//! `#[from]` so that layers can propagate with `?`. Every error maps to a
//! stable fault code through [`DevlinkError::code`], which is what a remote
//! actor gets to see.

use crate::command::CommandState;
use crate::id::CommandId;
use crate::role::Role;

/// Failure to turn a declarative definition into a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The definition at this path cannot be classified as any known type,
    /// or it redefines a base property with a different type.
    #[error("cannot classify property definition at '{0}'")]
    InvalidType(String),
    /// A constraint is malformed or inconsistent (`minimum > maximum`,
    /// enum member of the wrong type, invalid default, …).
    #[error("invalid constraint at '{path}': {reason}")]
    InvalidConstraint { path: String, reason: String },
    /// Strict override mode: the override names a key the base lacks.
    #[error("override of '{0}' does not match any base property")]
    UnknownOverrideKey(String),
    /// `minimalRole` is not one of `viewer`, `user`, `manager`, `owner`.
    #[error("invalid minimal role '{0}'")]
    InvalidRole(String),
    /// `visibility` is not `all`, `none` or a list of `local` / `cloud`.
    #[error("invalid visibility '{0}'")]
    InvalidVisibility(String),
    /// A command absent from the base registry lives outside the vendor
    /// (`_`-prefixed) namespace.
    #[error("custom command '{0}' must use a package or command name starting with '_'")]
    InvalidCommandName(String),
    /// A property added to an existing object is already declared there.
    #[error("property '{0}' is already defined")]
    DuplicateProperty(String),
    /// The document does not have the expected package → item nesting.
    #[error("malformed definition document at '{0}'")]
    Malformed(String),
}

/// A concrete value failed validation against its schema.
///
/// Field names are dotted paths (`_outer._inner`); array elements are
/// addressed as `_list[2]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("unexpected field '{0}'")]
    UnexpectedField(String),
    #[error("value of '{0}' is out of range")]
    OutOfRange(String),
    #[error("value of '{0}' has the wrong type")]
    TypeMismatch(String),
    #[error("value of '{0}' is not one of the allowed values")]
    NotInEnum(String),
}

/// Refusal to accept an inbound command request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("command '{command}' requires role {required}, actor has {actual}")]
    PermissionDenied {
        command: String,
        required: Role,
        actual: Role,
    },
    /// The request envelope itself (not its parameters) is malformed.
    #[error("malformed command request: {0}")]
    MalformedRequest(String),
}

/// Illegal command lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {operation} a command in state '{state}'")]
    InvalidState {
        state: CommandState,
        operation: &'static str,
    },
    /// The command instance was already discarded by its owner.
    #[error("command '{0}' is no longer tracked")]
    Discarded(CommandId),
}

/// Failure to mutate the state property store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid state value")]
    Validation(#[from] ValidationError),
    #[error("unknown state property '{0}'")]
    UnknownPath(String),
    #[error("state property '{0}' is already defined")]
    Redefinition(String),
}

/// Top-level error used across layers.
#[derive(Debug, thiserror::Error)]
pub enum DevlinkError {
    #[error("schema error")]
    Schema(#[from] SchemaError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("dispatch error")]
    Dispatch(#[from] DispatchError),

    #[error("lifecycle error")]
    Lifecycle(#[from] LifecycleError),

    #[error("state store error")]
    Store(#[from] StoreError),

    /// Failure reported by an external provider (settings, scheduler, …).
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DevlinkError {
    /// Stable fault code reported to remote actors.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Schema(_) => "invalid_property_definition",
            Self::Validation(_) | Self::Store(StoreError::Validation(_)) => {
                "invalid_parameter_value"
            }
            Self::Dispatch(DispatchError::UnknownCommand(_)) => "unknown_command",
            Self::Dispatch(DispatchError::PermissionDenied { .. }) => "access_denied",
            Self::Dispatch(DispatchError::MalformedRequest(_)) => "invalid_command_request",
            Self::Lifecycle(_) => "invalid_state",
            Self::Store(StoreError::UnknownPath(_)) => "unknown_property",
            Self::Store(StoreError::Redefinition(_)) => "invalid_property_definition",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Human-readable message including the innermost cause.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Schema(err) => err.to_string(),
            Self::Validation(err) | Self::Store(StoreError::Validation(err)) => err.to_string(),
            Self::Dispatch(err) => err.to_string(),
            Self::Lifecycle(err) => err.to_string(),
            Self::Store(err) => err.to_string(),
            Self::Storage(err) => err.to_string(),
        }
    }

    /// Fault body sent back to the remote actor.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_invalid_parameter_value_for_validation_errors() {
        let err: DevlinkError = ValidationError::OutOfRange("_led".to_string()).into();
        assert_eq!(err.code(), "invalid_parameter_value");
    }

    #[test]
    fn should_report_invalid_parameter_value_for_store_validation_errors() {
        let err: DevlinkError =
            StoreError::Validation(ValidationError::TypeMismatch("_a._b".to_string())).into();
        assert_eq!(err.code(), "invalid_parameter_value");
        assert_eq!(err.message(), "value of '_a._b' has the wrong type");
    }

    #[test]
    fn should_report_access_denied_for_permission_errors() {
        let err: DevlinkError = DispatchError::PermissionDenied {
            command: "_a._b".to_string(),
            required: Role::Manager,
            actual: Role::User,
        }
        .into();
        assert_eq!(err.code(), "access_denied");
    }

    #[test]
    fn should_render_fault_body_as_json() {
        let err: DevlinkError = DispatchError::UnknownCommand("_x._y".to_string()).into();
        assert_eq!(
            err.to_json(),
            serde_json::json!({
                "code": "unknown_command",
                "message": "unknown command '_x._y'",
            })
        );
    }

    #[test]
    fn should_display_dotted_path_in_validation_error() {
        let err = ValidationError::MissingField("_outer._inner".to_string());
        assert_eq!(err.to_string(), "missing required field '_outer._inner'");
    }
}
