//! State store: schema-validated device state, one object per package.
//!
//! Every stored value conforms to its declared schema: a batch of updates
//! is validated in full before anything is written, and a rejected batch
//! leaves the store untouched.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value as Json};

use devlink_domain::error::{DevlinkError, SchemaError, StoreError, ValidationError};
use devlink_domain::event::{Event, EventType};
use devlink_domain::schema::{BuildOptions, ObjectSchema};
use devlink_domain::value::{Value, ValueMap, map_to_json};

use crate::ports::SharedPublisher;

#[derive(Default)]
struct Inner {
    definitions: BTreeMap<String, ObjectSchema>,
    values: BTreeMap<String, ValueMap>,
}

impl Inner {
    fn snapshot(&self) -> Json {
        Json::Object(
            self.definitions
                .keys()
                .map(|package| {
                    let values = self
                        .values
                        .get(package)
                        .map_or_else(|| Json::Object(Map::new()), map_to_json);
                    (package.clone(), values)
                })
                .collect(),
        )
    }
}

/// Validated property store publishing a snapshot on every change.
pub struct StateStore {
    inner: Mutex<Inner>,
    publisher: SharedPublisher,
    options: BuildOptions,
}

impl StateStore {
    #[must_use]
    pub fn new(publisher: SharedPublisher, options: BuildOptions) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            publisher,
            options,
        }
    }

    /// Declare state properties from a `{package: {property: schema}}`
    /// document.
    ///
    /// Packages and properties are added to the ones already declared.
    /// Properties with a default start at that value.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for malformed schemas and
    /// [`StoreError::Redefinition`] when a property already exists; the
    /// store is then unchanged.
    #[tracing::instrument(skip(self, document))]
    pub fn load_definitions(&self, document: &Json) -> Result<(), DevlinkError> {
        let packages = document
            .as_object()
            .ok_or_else(|| SchemaError::Malformed(String::new()))?;

        let mut inner = self.lock();
        let mut staged = BTreeMap::new();
        for (package, definition) in packages {
            if package.is_empty() || package.contains('.') {
                return Err(SchemaError::Malformed(package.clone()).into());
            }
            let schema = ObjectSchema::from_json(definition, None, self.options)
                .map_err(|err| prefix_schema_error(err, package))?;
            let merged = match inner.definitions.get(package) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    merged.extend(schema).map_err(|err| match err {
                        SchemaError::DuplicateProperty(name) => {
                            DevlinkError::from(StoreError::Redefinition(format!("{package}.{name}")))
                        }
                        other => other.into(),
                    })?;
                    merged
                }
                None => schema,
            };
            staged.insert(package.clone(), merged);
        }

        for (package, schema) in staged {
            let values = inner.values.entry(package.clone()).or_default();
            for (name, property) in schema.properties() {
                if let Some(default) = &property.default {
                    values
                        .entry(name.to_string())
                        .or_insert_with(|| default.clone());
                }
            }
            tracing::debug!(%package, properties = schema.len(), "state package defined");
            inner.definitions.insert(package, schema);
        }
        Ok(())
    }

    /// Apply a batch of updates.
    ///
    /// Accepts nested `{package: {property: value}}` objects as well as
    /// dotted `{"package.property": value}` keys. Either every update is
    /// applied or none is. An accepted, non-empty batch publishes a
    /// [`EventType::StateChanged`] event with the full snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownPath`] for undeclared properties and
    /// [`StoreError::Validation`] for non-conforming values.
    #[tracing::instrument(skip(self, updates))]
    pub fn set_properties(&self, updates: &Json) -> Result<(), DevlinkError> {
        let updates = updates
            .as_object()
            .ok_or_else(|| StoreError::Validation(ValidationError::TypeMismatch(String::new())))?;

        let snapshot = {
            let mut inner = self.lock();
            let staged = stage_updates(&inner, updates)?;
            if staged.is_empty() {
                return Ok(());
            }
            for (package, name, value) in staged {
                inner
                    .values
                    .entry(package)
                    .or_default()
                    .insert(name, value);
            }
            inner.snapshot()
        };

        if let Err(err) = self
            .publisher
            .publish(Event::new(EventType::StateChanged, None, snapshot))
        {
            tracing::warn!(error = %err, "failed to publish state change");
        }
        Ok(())
    }

    /// Update a single `package.property`.
    ///
    /// # Errors
    ///
    /// Same as [`set_properties`](Self::set_properties).
    pub fn set_property(&self, path: &str, value: Json) -> Result<(), DevlinkError> {
        if !path.contains('.') {
            return Err(StoreError::UnknownPath(path.to_string()).into());
        }
        let mut updates = Map::new();
        updates.insert(path.to_string(), value);
        self.set_properties(&Json::Object(updates))
    }

    /// Current value of `package.property`, if set.
    #[must_use]
    pub fn get_property(&self, path: &str) -> Option<Value> {
        let (package, name) = path.split_once('.')?;
        self.lock().values.get(package)?.get(name).cloned()
    }

    /// Full snapshot `{package: {property: value}}`.
    #[must_use]
    pub fn state(&self) -> Json {
        self.lock().snapshot()
    }

    /// Declared schemas in declarative form.
    #[must_use]
    pub fn definitions_as_json(&self) -> Json {
        Json::Object(
            self.lock()
                .definitions
                .iter()
                .map(|(package, schema)| (package.clone(), schema.to_json(true, None)))
                .collect(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn prefix_schema_error(err: SchemaError, package: &str) -> SchemaError {
    let prefix = |path: String| {
        if path.is_empty() {
            package.to_string()
        } else {
            format!("{package}.{path}")
        }
    };
    match err {
        SchemaError::InvalidType(path) => SchemaError::InvalidType(prefix(path)),
        SchemaError::InvalidConstraint { path, reason } => SchemaError::InvalidConstraint {
            path: prefix(path),
            reason,
        },
        SchemaError::UnknownOverrideKey(path) => SchemaError::UnknownOverrideKey(prefix(path)),
        other => other,
    }
}

fn stage_updates(
    inner: &Inner,
    updates: &Map<String, Json>,
) -> Result<Vec<(String, String, Value)>, StoreError> {
    let mut staged = Vec::new();
    for (key, value) in updates {
        if let Some((package, name)) = key.split_once('.') {
            staged.push(stage_one(inner, package, name, value)?);
            continue;
        }
        let properties = value
            .as_object()
            .ok_or_else(|| ValidationError::TypeMismatch(key.clone()))?;
        for (name, value) in properties {
            staged.push(stage_one(inner, key, name, value)?);
        }
    }
    Ok(staged)
}

fn stage_one(
    inner: &Inner,
    package: &str,
    name: &str,
    value: &Json,
) -> Result<(String, String, Value), StoreError> {
    let path = format!("{package}.{name}");
    let property = inner
        .definitions
        .get(package)
        .and_then(|schema| schema.property(name))
        .ok_or_else(|| StoreError::UnknownPath(path.clone()))?;
    let value = property.schema.validate(value, &path)?;
    Ok((package.to_string(), name.to_string(), value))
}
