use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::error::SchemaError;
use crate::role::Role;
use crate::schema::{BuildOptions, ObjectSchema};

/// Where a command may be invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility {
    pub local: bool,
    pub cloud: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::ALL
    }
}

impl Visibility {
    pub const ALL: Self = Self {
        local: true,
        cloud: true,
    };
    pub const NONE: Self = Self {
        local: false,
        cloud: false,
    };
    pub const LOCAL: Self = Self {
        local: true,
        cloud: false,
    };
    pub const CLOUD: Self = Self {
        local: false,
        cloud: true,
    };
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.local, self.cloud) {
            (true, true) => "all",
            (false, false) => "none",
            (true, false) => "local",
            (false, true) => "cloud",
        };
        f.write_str(name)
    }
}

/// Accepts `all`, `none` or a comma separated list of `local` / `cloud`.
impl FromStr for Visibility {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => return Ok(Self::ALL),
            "none" => return Ok(Self::NONE),
            _ => {}
        }
        let mut visibility = Self::NONE;
        for part in s.split(',').map(str::trim) {
            match part {
                "local" => visibility.local = true,
                "cloud" => visibility.cloud = true,
                _ => return Err(SchemaError::InvalidVisibility(s.to_string())),
            }
        }
        Ok(visibility)
    }
}

/// Schema and access rules for one `package.command`.
///
/// A definition loaded over a base registry keeps a reference to the base
/// definition it narrows so that it can be rendered as a delta.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    pub package: String,
    pub name: String,
    pub parameters: ObjectSchema,
    pub progress: Option<ObjectSchema>,
    pub results: Option<ObjectSchema>,
    pub minimal_role: Role,
    pub visibility: Visibility,
    pub base: Option<Arc<CommandDefinition>>,
}

impl CommandDefinition {
    /// Build a definition from its declarative form.
    ///
    /// Sections missing from `definition` are inherited from `base`; the
    /// minimal role defaults to [`Role::User`] and visibility to all.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when any schema section fails to build or
    /// `minimalRole` / `visibility` cannot be parsed.
    pub fn from_json(
        package: &str,
        name: &str,
        definition: &Json,
        base: Option<Arc<CommandDefinition>>,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        let full_name = format!("{package}.{name}");
        let map = definition
            .as_object()
            .ok_or_else(|| SchemaError::Malformed(full_name.clone()))?;
        let base_ref = base.as_deref();

        let parameters = match map.get("parameters") {
            Some(section) => ObjectSchema::build(
                section,
                base_ref.map(|base| &base.parameters),
                &format!("{full_name}.parameters"),
                options,
            )?,
            None => base_ref.map_or_else(
                || ObjectSchema::empty(options),
                |base| base.parameters.clone(),
            ),
        };
        let progress = optional_section(
            map,
            "progress",
            base_ref.and_then(|base| base.progress.as_ref()),
            &full_name,
            options,
        )?;
        let results = optional_section(
            map,
            "results",
            base_ref.and_then(|base| base.results.as_ref()),
            &full_name,
            options,
        )?;

        let minimal_role = match map.get("minimalRole") {
            Some(role) => role
                .as_str()
                .ok_or_else(|| SchemaError::InvalidRole(role.to_string()))?
                .parse()?,
            None => base_ref.map(|base| base.minimal_role).unwrap_or_default(),
        };
        let visibility = match map.get("visibility") {
            Some(visibility) => visibility
                .as_str()
                .ok_or_else(|| SchemaError::InvalidVisibility(visibility.to_string()))?
                .parse()?,
            None => base_ref.map(|base| base.visibility).unwrap_or_default(),
        };

        Ok(Self {
            package: package.to_string(),
            name: name.to_string(),
            parameters,
            progress,
            results,
            minimal_role,
            visibility,
            base,
        })
    }

    /// `package.command`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    /// Declarative form; without `full` only what differs from the base
    /// definition is emitted for each schema section.
    #[must_use]
    pub fn to_json(&self, full: bool) -> Json {
        let base = self.base.as_deref();
        let mut out = Map::new();
        out.insert(
            "parameters".to_string(),
            self.parameters
                .to_json(full, base.map(|base| &base.parameters)),
        );
        if let Some(progress) = &self.progress {
            out.insert(
                "progress".to_string(),
                progress.to_json(full, base.and_then(|base| base.progress.as_ref())),
            );
        }
        if let Some(results) = &self.results {
            out.insert(
                "results".to_string(),
                results.to_json(full, base.and_then(|base| base.results.as_ref())),
            );
        }
        out.insert(
            "minimalRole".to_string(),
            Json::String(self.minimal_role.as_str().to_string()),
        );
        out.insert(
            "visibility".to_string(),
            Json::String(self.visibility.to_string()),
        );
        Json::Object(out)
    }
}

fn optional_section(
    map: &Map<String, Json>,
    key: &str,
    base: Option<&ObjectSchema>,
    full_name: &str,
    options: BuildOptions,
) -> Result<Option<ObjectSchema>, SchemaError> {
    match map.get(key) {
        Some(section) => {
            ObjectSchema::build(section, base, &format!("{full_name}.{key}"), options).map(Some)
        }
        None => Ok(base.cloned()),
    }
}
