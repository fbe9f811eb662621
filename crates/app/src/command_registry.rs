//! Command definition registry.
//!
//! Definitions are keyed by `package.command` and loaded from the two-level
//! declarative document `{package: {command: definition}}`. A load either
//! applies completely or leaves the registry untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use devlink_domain::command::CommandDefinition;
use devlink_domain::error::{DevlinkError, SchemaError};
use devlink_domain::schema::BuildOptions;

/// Ordered collection of command definitions.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    definitions: BTreeMap<String, Arc<CommandDefinition>>,
    options: BuildOptions,
}

impl CommandRegistry {
    /// Create an empty registry whose schemas are built with `options`.
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        Self {
            definitions: BTreeMap::new(),
            options,
        }
    }

    /// Parse `document` and merge its definitions into the registry.
    ///
    /// When `base` is given, each command found there serves as the override
    /// base of the command with the same key, and a command absent from it
    /// must live in the vendor namespace (package or command name starting
    /// with `_`). Definitions with an existing key replace the old ones.
    ///
    /// Returns the number of definitions loaded.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] encountered; the registry is then
    /// left exactly as it was.
    #[tracing::instrument(skip(self, document, base))]
    pub fn load_commands(
        &mut self,
        document: &Json,
        base: Option<&CommandRegistry>,
    ) -> Result<usize, DevlinkError> {
        let packages = document
            .as_object()
            .ok_or_else(|| SchemaError::Malformed(String::new()))?;

        let mut staged = Vec::new();
        for (package, commands) in packages {
            let commands = commands
                .as_object()
                .ok_or_else(|| SchemaError::Malformed(package.clone()))?;
            for (name, definition) in commands {
                staged.push(self.stage(package, name, definition, base)?);
            }
        }

        let count = staged.len();
        for definition in staged {
            self.definitions
                .insert(definition.full_name(), Arc::new(definition));
        }
        tracing::debug!(count, total = self.definitions.len(), "command definitions loaded");
        Ok(count)
    }

    fn stage(
        &self,
        package: &str,
        name: &str,
        definition: &Json,
        base: Option<&CommandRegistry>,
    ) -> Result<CommandDefinition, SchemaError> {
        let full_name = format!("{package}.{name}");
        if [package, name]
            .iter()
            .any(|segment| segment.is_empty() || segment.contains('.'))
        {
            return Err(SchemaError::Malformed(full_name));
        }
        let base_definition = match base {
            Some(base) => {
                let found = base.find_shared(&full_name);
                if found.is_none() && !package.starts_with('_') && !name.starts_with('_') {
                    return Err(SchemaError::InvalidCommandName(full_name));
                }
                found
            }
            None => None,
        };
        CommandDefinition::from_json(package, name, definition, base_definition, self.options)
    }

    /// Render the definitions accepted by `filter` as a
    /// `{package: {command: definition}}` document.
    ///
    /// Without `full_schema` each definition carries only what differs from
    /// its base definition.
    #[must_use]
    pub fn commands_as_json(
        &self,
        filter: impl Fn(&CommandDefinition) -> bool,
        full_schema: bool,
    ) -> Json {
        let mut packages: Map<String, Json> = Map::new();
        for definition in self.definitions.values().filter(|def| filter(def)) {
            let commands = packages
                .entry(definition.package.clone())
                .or_insert_with(|| Json::Object(Map::new()));
            if let Some(commands) = commands.as_object_mut() {
                commands.insert(definition.name.clone(), definition.to_json(full_schema));
            }
        }
        Json::Object(packages)
    }

    /// Look up a definition by `package.command`.
    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<&CommandDefinition> {
        self.definitions.get(name).map(AsRef::as_ref)
    }

    /// Editable access for internal bookkeeping. Instances created earlier
    /// keep the definition they were created with.
    pub fn find_command_mut(&mut self, name: &str) -> Option<&mut CommandDefinition> {
        self.definitions.get_mut(name).map(Arc::make_mut)
    }

    pub(crate) fn find_shared(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        self.definitions.get(name).cloned()
    }

    /// Drop every definition, e.g. before a full reload.
    pub fn clear(&mut self) {
        self.definitions.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Names of all definitions, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_domain::command::Visibility;
    use devlink_domain::error::ValidationError;
    use devlink_domain::role::Role;
    use serde_json::json;

    fn registry_with(document: &Json) -> CommandRegistry {
        let mut registry = CommandRegistry::default();
        registry.load_commands(document, None).unwrap();
        registry
    }

    fn base_registry() -> CommandRegistry {
        registry_with(&json!({
            "base": {
                "reboot": {"minimalRole": "manager", "parameters": {"delay": {"minimum": 0, "maximum": 60}}},
                "identify": {"parameters": {}},
            }
        }))
    }

    #[test]
    fn should_find_loaded_command_and_validate_its_parameters() {
        let registry = registry_with(&json!({"_greeter": {"_greet": {"parameters": {"_name": "string"}}}}));

        let definition = registry.find_command("_greeter._greet").unwrap();
        assert!(definition.parameters.validate(&json!({"_name": "Bob"})).is_ok());
        assert_eq!(
            definition.parameters.validate(&json!({"_name": 42})),
            Err(ValidationError::TypeMismatch("_name".to_string()))
        );
        assert_eq!(definition.minimal_role, Role::User);
    }

    #[test]
    fn should_leave_registry_unchanged_when_one_command_is_malformed() {
        let mut registry = registry_with(&json!({"_a": {"_one": {"parameters": {"_x": "string"}}}}));
        let before: Vec<String> = registry.names().map(str::to_string).collect();
        let before_json = registry.commands_as_json(|_| true, true);

        let result = registry.load_commands(
            &json!({
                "_a": {"_one": {"parameters": {"_x": "integer"}}, "_two": {}},
                "_b": {"_bad": {"parameters": {"_y": {"minimum": 3, "maximum": 1}}}},
            }),
            None,
        );

        assert!(matches!(
            result,
            Err(DevlinkError::Schema(SchemaError::InvalidConstraint { .. }))
        ));
        let after: Vec<String> = registry.names().map(str::to_string).collect();
        assert_eq!(before, after);
        assert_eq!(registry.commands_as_json(|_| true, true), before_json);
    }

    #[test]
    fn should_replace_existing_definitions_on_reload() {
        let mut registry = registry_with(&json!({"_a": {"_one": {"parameters": {"_x": "string"}}}}));
        let count = registry
            .load_commands(&json!({"_a": {"_one": {"parameters": {"_x": "integer"}}, "_two": {}}}), None)
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.len(), 2);
        let one = registry.find_command("_a._one").unwrap();
        assert!(one.parameters.validate(&json!({"_x": 1})).is_ok());
    }

    #[test]
    fn should_reject_non_object_nesting() {
        let mut registry = CommandRegistry::default();
        let result = registry.load_commands(&json!({"_a": ["_one"]}), None);
        assert!(matches!(
            result,
            Err(DevlinkError::Schema(SchemaError::Malformed(path))) if path == "_a"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn should_merge_over_base_definition() {
        let base = base_registry();
        let mut registry = CommandRegistry::default();
        registry
            .load_commands(&json!({"base": {"reboot": {"parameters": {"delay": {"maximum": 10}}}}}), Some(&base))
            .unwrap();

        let reboot = registry.find_command("base.reboot").unwrap();
        assert_eq!(reboot.minimal_role, Role::Manager);
        assert_eq!(
            reboot.parameters.validate(&json!({"delay": 20})),
            Err(ValidationError::OutOfRange("delay".to_string()))
        );
    }

    #[test]
    fn should_reject_custom_command_outside_vendor_namespace() {
        let base = base_registry();
        let mut registry = CommandRegistry::default();
        let result = registry.load_commands(&json!({"base": {"shutdown": {}}}), Some(&base));
        assert!(matches!(
            result,
            Err(DevlinkError::Schema(SchemaError::InvalidCommandName(name))) if name == "base.shutdown"
        ));
    }

    #[test]
    fn should_reject_dotted_package_or_command_name() {
        let mut registry = CommandRegistry::default();
        registry
            .load_commands(&json!({"_a": {"_b": {}}}), None)
            .unwrap();

        for document in [
            json!({"_a.b": {"_c": {}}}),
            json!({"_a": {"_b._c": {}}}),
            json!({"": {"_c": {}}}),
        ] {
            let result = registry.load_commands(&document, None);
            assert!(
                matches!(result, Err(DevlinkError::Schema(SchemaError::Malformed(_)))),
                "{document} was accepted"
            );
        }
        assert_eq!(registry.len(), 1);
        assert!(registry.find_command("_a.b._c").is_none());
    }

    #[test]
    fn should_accept_custom_command_in_vendor_namespace() {
        let base = base_registry();
        let mut registry = CommandRegistry::default();
        registry
            .load_commands(&json!({"base": {"_jump": {}}, "_robot": {"walk": {}}}), Some(&base))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn should_render_only_filtered_commands() {
        let registry = registry_with(&json!({
            "_a": {
                "_shown": {"parameters": {"_x": "string"}},
                "_hidden": {"visibility": "local"},
            }
        }));

        let json = registry.commands_as_json(|def| def.visibility.cloud, true);
        assert_eq!(
            json,
            json!({"_a": {"_shown": {
                "parameters": {"_x": "string"},
                "minimalRole": "user",
                "visibility": "all",
            }}})
        );
    }

    #[test]
    fn should_render_delta_against_base() {
        let base = base_registry();
        let mut registry = CommandRegistry::default();
        registry
            .load_commands(&json!({"base": {"reboot": {"parameters": {"delay": {"maximum": 10}}}}}), Some(&base))
            .unwrap();

        assert_eq!(
            registry.commands_as_json(|_| true, false),
            json!({"base": {"reboot": {
                "parameters": {"delay": {"maximum": 10}},
                "minimalRole": "manager",
                "visibility": "all",
            }}})
        );
    }

    #[test]
    fn should_edit_definition_in_place() {
        let mut registry = registry_with(&json!({"_a": {"_one": {}}}));
        registry.find_command_mut("_a._one").unwrap().visibility = Visibility::NONE;
        assert_eq!(registry.find_command("_a._one").unwrap().visibility, Visibility::NONE);
    }

    #[test]
    fn should_drop_everything_on_clear() {
        let mut registry = registry_with(&json!({"_a": {"_one": {}, "_two": {}}}));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.find_command("_a._one").is_none());
    }
}
