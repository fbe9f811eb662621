//! Device: one device session bundling commands, dispatcher and state.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value as Json;

use devlink_domain::command::CommandDefinition;
use devlink_domain::error::{DevlinkError, DispatchError};
use devlink_domain::role::Role;
use devlink_domain::schema::BuildOptions;

use crate::command_registry::CommandRegistry;
use crate::ports::SharedPublisher;
use crate::services::command_dispatcher::{CommandDispatcher, CommandHandle, CommandHandler};
use crate::services::state_store::StateStore;

/// Facade over everything a device exposes to remote actors.
///
/// Commands loaded through [`add_command_definitions`](Self::add_command_definitions)
/// are merged over the base ("standard") commands given at construction.
pub struct Device {
    base_commands: CommandRegistry,
    registry: Arc<RwLock<CommandRegistry>>,
    dispatcher: CommandDispatcher,
    state: Arc<StateStore>,
    options: BuildOptions,
}

impl Device {
    /// Create a device with no base commands.
    #[must_use]
    pub fn new(publisher: SharedPublisher, options: BuildOptions) -> Self {
        let registry = Arc::new(RwLock::new(CommandRegistry::new(options)));
        Self {
            base_commands: CommandRegistry::new(options),
            dispatcher: CommandDispatcher::new(Arc::clone(&registry), Arc::clone(&publisher)),
            registry,
            state: Arc::new(StateStore::new(publisher, options)),
            options,
        }
    }

    /// Load the base command definitions device commands are checked against.
    ///
    /// # Errors
    ///
    /// Returns the first schema error; no base command is loaded then.
    pub fn with_base_commands(mut self, document: &Json) -> Result<Self, DevlinkError> {
        let mut base = CommandRegistry::new(self.options);
        base.load_commands(document, None)?;
        self.base_commands = base;
        Ok(self)
    }

    #[must_use]
    pub fn base_commands(&self) -> &CommandRegistry {
        &self.base_commands
    }

    /// Load device command definitions over the base commands.
    ///
    /// # Errors
    ///
    /// See [`CommandRegistry::load_commands`].
    pub fn add_command_definitions(&self, document: &Json) -> Result<usize, DevlinkError> {
        let base = (!self.base_commands.is_empty()).then_some(&self.base_commands);
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .load_commands(document, base)
    }

    /// See [`CommandRegistry::commands_as_json`].
    #[must_use]
    pub fn commands_as_json(
        &self,
        filter: impl Fn(&CommandDefinition) -> bool,
        full_schema: bool,
    ) -> Json {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .commands_as_json(filter, full_schema)
    }

    /// Look up a device command definition by `package.command`.
    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<CommandDefinition> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .find_command(name)
            .cloned()
    }

    pub fn add_command_handler(&self, name: &str, handler: impl CommandHandler + 'static) {
        self.dispatcher.add_handler(name, handler);
    }

    pub fn set_fallback_handler(&self, handler: impl CommandHandler + 'static) {
        self.dispatcher.set_fallback_handler(handler);
    }

    /// See [`CommandDispatcher::dispatch`].
    ///
    /// # Errors
    ///
    /// See [`CommandDispatcher::dispatch`].
    pub fn dispatch(
        &self,
        package: &str,
        command: &str,
        parameters: &Json,
        role: Role,
    ) -> Result<CommandHandle, DevlinkError> {
        self.dispatcher.dispatch(package, command, parameters, role)
    }

    /// Dispatch a `{"name": "package.command", "parameters": {…}}` request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedRequest`] when the envelope is not
    /// an object or has no valid `name`, otherwise as
    /// [`dispatch`](Self::dispatch).
    pub fn add_command(&self, request: &Json, role: Role) -> Result<CommandHandle, DevlinkError> {
        let request = request
            .as_object()
            .ok_or_else(|| DispatchError::MalformedRequest("request must be an object".to_string()))?;
        let name = request
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| DispatchError::MalformedRequest("missing command name".to_string()))?;
        let (package, command) = name
            .split_once('.')
            .filter(|(package, command)| !package.is_empty() && !command.is_empty())
            .ok_or_else(|| DispatchError::MalformedRequest(format!("invalid command name '{name}'")))?;
        let empty = Json::Object(serde_json::Map::new());
        let parameters = request.get("parameters").unwrap_or(&empty);
        self.dispatch(package, command, parameters, role)
    }

    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn state_store(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// See [`StateStore::load_definitions`].
    ///
    /// # Errors
    ///
    /// See [`StateStore::load_definitions`].
    pub fn add_state_definitions(&self, document: &Json) -> Result<(), DevlinkError> {
        self.state.load_definitions(document)
    }

    /// See [`StateStore::set_properties`].
    ///
    /// # Errors
    ///
    /// See [`StateStore::set_properties`].
    pub fn set_state_properties(&self, updates: &Json) -> Result<(), DevlinkError> {
        self.state.set_properties(updates)
    }

    /// See [`StateStore::set_property`].
    ///
    /// # Errors
    ///
    /// See [`StateStore::set_property`].
    pub fn set_state_property(&self, path: &str, value: Json) -> Result<(), DevlinkError> {
        self.state.set_property(path, value)
    }

    #[must_use]
    pub fn state(&self) -> Json {
        self.state.state()
    }
}
