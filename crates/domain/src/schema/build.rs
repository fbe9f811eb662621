//! Classification of declarative definitions into schema trees, including
//! override merging against a base schema.

use serde_json::{Map, Value as Json};

use super::{
    ArraySchema, IntegerSchema, NumberSchema, ObjectSchema, PropertySchema, StringSchema,
    ValueSchema, ValueType, child_path,
};
use crate::error::SchemaError;

/// Knobs applied while building a schema tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Reject override keys the base schema does not define instead of
    /// adding them.
    pub strict_overrides: bool,
    /// Objects ignore unknown keys unless they declare
    /// `additionalProperties: false`.
    pub lenient_objects: bool,
}

const COMMON_KEYS: &[&str] = &["type", "default", "isRequired"];

/// How a definition object is to be read once its type is known.
enum Form {
    /// Keys are constraints of a property of this type.
    Constraints(ValueType),
    /// Keys are child property definitions of a nested object.
    NestedObject,
}

impl ObjectSchema {
    /// Build an object schema from a map of property definitions.
    ///
    /// With a `base`, keys present in `definition` override or narrow the
    /// base property of the same name, keys absent from `definition` are
    /// inherited unchanged, and new keys extend the schema (unless
    /// [`BuildOptions::strict_overrides`] is set).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidType`] when a definition cannot be
    /// classified, [`SchemaError::InvalidConstraint`] for inconsistent
    /// constraints, and [`SchemaError::UnknownOverrideKey`] in strict mode.
    pub fn from_json(
        definition: &Json,
        base: Option<&ObjectSchema>,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        Self::build(definition, base, "", options)
    }

    /// Same as [`from_json`](Self::from_json), reporting errors below `path`.
    pub(crate) fn build(
        definition: &Json,
        base: Option<&ObjectSchema>,
        path: &str,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        let map = definition
            .as_object()
            .ok_or_else(|| SchemaError::InvalidType(path.to_string()))?;
        Self::from_properties(map, base, path, options)
    }

    fn from_properties(
        map: &Map<String, Json>,
        base: Option<&ObjectSchema>,
        path: &str,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        let mut schema = base.cloned().unwrap_or_else(|| Self::empty(options));
        for (name, definition) in map {
            let property_path = child_path(path, name);
            let base_property = base.and_then(|base| base.properties.get(name));
            if options.strict_overrides && base.is_some() && base_property.is_none() {
                return Err(SchemaError::UnknownOverrideKey(property_path));
            }
            let property =
                PropertySchema::from_json(definition, base_property, &property_path, options)?;
            schema.properties.insert(name.clone(), property);
        }
        Ok(schema)
    }

    /// Add properties without base merging; names must be new.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateProperty`] naming the first property
    /// that already exists; `self` is then unchanged.
    pub fn extend(&mut self, other: ObjectSchema) -> Result<(), SchemaError> {
        if let Some(name) = other
            .properties
            .keys()
            .find(|name| self.properties.contains_key(*name))
        {
            return Err(SchemaError::DuplicateProperty(name.clone()));
        }
        self.properties.extend(other.properties);
        Ok(())
    }
}

impl PropertySchema {
    fn from_json(
        definition: &Json,
        base: Option<&PropertySchema>,
        path: &str,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        match definition {
            Json::String(name) => {
                let value_type = ValueType::from_name(name)
                    .ok_or_else(|| SchemaError::InvalidType(path.to_string()))?;
                match base {
                    Some(base) if base.schema.value_type() == value_type => Ok(base.clone()),
                    Some(_) => Err(SchemaError::InvalidType(path.to_string())),
                    None => Ok(Self::new(ValueSchema::unconstrained(value_type, options))),
                }
            }
            Json::Array(_) => {
                let mut map = Map::new();
                map.insert("enum".to_string(), definition.clone());
                Self::from_constraints(&map, base, path, options)
            }
            Json::Object(map) => Self::from_constraints(map, base, path, options),
            _ => Err(SchemaError::InvalidType(path.to_string())),
        }
    }

    fn from_constraints(
        map: &Map<String, Json>,
        base: Option<&PropertySchema>,
        path: &str,
        options: BuildOptions,
    ) -> Result<Self, SchemaError> {
        let value_type = match resolve_form(map, base, path)? {
            Form::NestedObject => {
                let base_object = base.and_then(|base| base.schema.as_object());
                let object = ObjectSchema::from_properties(map, base_object, path, options)?;
                let mut property = base
                    .cloned()
                    .unwrap_or_else(|| Self::new(ValueSchema::Object(ObjectSchema::empty(options))));
                property.schema = ValueSchema::Object(object);
                return Ok(property);
            }
            Form::Constraints(value_type) => value_type,
        };

        let mut property = base
            .cloned()
            .unwrap_or_else(|| Self::new(ValueSchema::unconstrained(value_type, options)));

        for key in map.keys() {
            if !COMMON_KEYS.contains(&key.as_str()) && !constraint_keys(value_type).contains(&key.as_str()) {
                return Err(invalid(path, format!("unsupported constraint '{key}' for {value_type}")));
            }
        }

        match &mut property.schema {
            ValueSchema::Boolean => {}
            ValueSchema::Integer(schema) => apply_integer(schema, map, path)?,
            ValueSchema::Number(schema) => apply_number(schema, map, path)?,
            ValueSchema::String(schema) => apply_string(schema, map, path)?,
            ValueSchema::Array(schema) => {
                if let Some(items) = map.get("items") {
                    let base_items = schema
                        .items
                        .as_deref()
                        .map(|items| Self::new(items.clone()));
                    let items_path = format!("{path}[]");
                    let built = Self::from_json(items, base_items.as_ref(), &items_path, options)?;
                    *schema = ArraySchema {
                        items: Some(Box::new(built.schema)),
                    };
                }
            }
            ValueSchema::Object(schema) => {
                if let Some(properties) = map.get("properties") {
                    let base_object = base.and_then(|base| base.schema.as_object());
                    *schema = ObjectSchema::build(properties, base_object, path, options)?;
                }
                if let Some(flag) = map.get("additionalProperties") {
                    schema.additional_properties = flag
                        .as_bool()
                        .ok_or_else(|| invalid(path, "additionalProperties must be a boolean"))?;
                }
            }
        }

        if let Some(required) = map.get("isRequired") {
            let required = required
                .as_bool()
                .ok_or_else(|| invalid(path, "isRequired must be a boolean"))?;
            property.optional = !required;
        }

        property.schema.check_consistency(path)?;

        let default = match map.get("default") {
            Some(default) => Some(default.clone()),
            None => property.default.as_ref().map(crate::value::Value::to_json),
        };
        if let Some(default) = default {
            let value = property
                .schema
                .validate(&default, path)
                .map_err(|err| invalid(path, format!("default does not conform: {err}")))?;
            property.default = Some(value);
        }

        Ok(property)
    }
}

fn resolve_form(
    map: &Map<String, Json>,
    base: Option<&PropertySchema>,
    path: &str,
) -> Result<Form, SchemaError> {
    if let Some(name) = map.get("type") {
        let value_type = name
            .as_str()
            .and_then(ValueType::from_name)
            .ok_or_else(|| SchemaError::InvalidType(path.to_string()))?;
        if base.is_some_and(|base| base.schema.value_type() != value_type) {
            return Err(SchemaError::InvalidType(path.to_string()));
        }
        return Ok(Form::Constraints(value_type));
    }

    if let Some(base) = base {
        let value_type = base.schema.value_type();
        if value_type == ValueType::Object && !has_object_keywords(map) {
            return Ok(Form::NestedObject);
        }
        return Ok(Form::Constraints(value_type));
    }

    infer_form(map, path)
}

fn has_object_keywords(map: &Map<String, Json>) -> bool {
    ["properties", "additionalProperties", "default", "isRequired"]
        .iter()
        .any(|key| map.contains_key(*key))
}

fn infer_form(map: &Map<String, Json>, path: &str) -> Result<Form, SchemaError> {
    if map.contains_key("properties") || map.contains_key("additionalProperties") {
        return Ok(Form::Constraints(ValueType::Object));
    }
    if map.contains_key("items") {
        return Ok(Form::Constraints(ValueType::Array));
    }
    if let Some(values) = map.get("enum") {
        return infer_enum_type(values, path).map(Form::Constraints);
    }
    let bounds: Vec<&Json> = ["minimum", "maximum"]
        .iter()
        .filter_map(|key| map.get(*key))
        .collect();
    if !bounds.is_empty() {
        if bounds.iter().any(|bound| !bound.is_number()) {
            return Err(invalid(path, "bounds must be numbers"));
        }
        let integral = bounds.iter().all(|bound| bound.is_i64());
        return Ok(Form::Constraints(if integral {
            ValueType::Integer
        } else {
            ValueType::Number
        }));
    }
    if map.contains_key("minLength") || map.contains_key("maxLength") {
        return Ok(Form::Constraints(ValueType::String));
    }
    if let Some(default) = map.get("default") {
        return json_type(default)
            .map(Form::Constraints)
            .ok_or_else(|| SchemaError::InvalidType(path.to_string()));
    }
    Ok(Form::NestedObject)
}

fn infer_enum_type(values: &Json, path: &str) -> Result<ValueType, SchemaError> {
    let values = values
        .as_array()
        .filter(|values| !values.is_empty())
        .ok_or_else(|| SchemaError::InvalidType(path.to_string()))?;
    if values.iter().all(Json::is_string) {
        Ok(ValueType::String)
    } else if values.iter().all(Json::is_i64) {
        Ok(ValueType::Integer)
    } else if values.iter().all(Json::is_number) {
        Ok(ValueType::Number)
    } else {
        Err(SchemaError::InvalidType(path.to_string()))
    }
}

fn json_type(value: &Json) -> Option<ValueType> {
    match value {
        Json::Null => None,
        Json::Bool(_) => Some(ValueType::Boolean),
        Json::Number(n) if n.is_i64() => Some(ValueType::Integer),
        Json::Number(_) => Some(ValueType::Number),
        Json::String(_) => Some(ValueType::String),
        Json::Array(_) => Some(ValueType::Array),
        Json::Object(_) => Some(ValueType::Object),
    }
}

fn constraint_keys(value_type: ValueType) -> &'static [&'static str] {
    match value_type {
        ValueType::Boolean => &[],
        ValueType::Integer | ValueType::Number => &["minimum", "maximum", "enum"],
        ValueType::String => &["minLength", "maxLength", "enum"],
        ValueType::Object => &["properties", "additionalProperties"],
        ValueType::Array => &["items"],
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidConstraint {
        path: path.to_string(),
        reason: reason.into(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(value: &Json) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn apply_integer(
    schema: &mut IntegerSchema,
    map: &Map<String, Json>,
    path: &str,
) -> Result<(), SchemaError> {
    let bound = |key: &str| {
        map.get(key)
            .map(|value| integral(value).ok_or_else(|| invalid(path, format!("{key} must be an integer"))))
            .transpose()
    };
    if let Some(minimum) = bound("minimum")? {
        schema.minimum = Some(minimum);
    }
    if let Some(maximum) = bound("maximum")? {
        schema.maximum = Some(maximum);
    }
    if let Some(values) = map.get("enum") {
        schema.enum_values = Some(enum_members(values, path, integral)?);
    }
    Ok(())
}

fn apply_number(
    schema: &mut NumberSchema,
    map: &Map<String, Json>,
    path: &str,
) -> Result<(), SchemaError> {
    let bound = |key: &str| {
        map.get(key)
            .map(|value| value.as_f64().ok_or_else(|| invalid(path, format!("{key} must be a number"))))
            .transpose()
    };
    if let Some(minimum) = bound("minimum")? {
        schema.minimum = Some(minimum);
    }
    if let Some(maximum) = bound("maximum")? {
        schema.maximum = Some(maximum);
    }
    if let Some(values) = map.get("enum") {
        schema.enum_values = Some(enum_members(values, path, Json::as_f64)?);
    }
    Ok(())
}

fn apply_string(
    schema: &mut StringSchema,
    map: &Map<String, Json>,
    path: &str,
) -> Result<(), SchemaError> {
    let length = |key: &str| {
        map.get(key)
            .map(|value| {
                value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| invalid(path, format!("{key} must be a non-negative integer")))
            })
            .transpose()
    };
    if let Some(min_length) = length("minLength")? {
        schema.min_length = Some(min_length);
    }
    if let Some(max_length) = length("maxLength")? {
        schema.max_length = Some(max_length);
    }
    if let Some(values) = map.get("enum") {
        schema.enum_values = Some(enum_members(values, path, |value| {
            value.as_str().map(str::to_string)
        })?);
    }
    Ok(())
}

fn enum_members<T>(
    values: &Json,
    path: &str,
    convert: impl Fn(&Json) -> Option<T>,
) -> Result<Vec<T>, SchemaError> {
    let values = values
        .as_array()
        .ok_or_else(|| invalid(path, "enum must be an array"))?;
    values
        .iter()
        .map(|value| {
            convert(value).ok_or_else(|| invalid(path, format!("enum member {value} has the wrong type")))
        })
        .collect()
}

impl ValueSchema {
    /// Check that the constraints of this node agree with each other.
    fn check_consistency(&self, path: &str) -> Result<(), SchemaError> {
        match self {
            Self::Integer(schema) => {
                check_bounds(schema.minimum, schema.maximum, path)?;
                check_members(schema.enum_values.as_deref(), path, |value| {
                    schema.minimum.is_none_or(|min| *value >= min)
                        && schema.maximum.is_none_or(|max| *value <= max)
                })
            }
            Self::Number(schema) => {
                check_bounds(schema.minimum, schema.maximum, path)?;
                check_members(schema.enum_values.as_deref(), path, |value| {
                    schema.minimum.is_none_or(|min| *value >= min)
                        && schema.maximum.is_none_or(|max| *value <= max)
                })
            }
            Self::String(schema) => {
                check_bounds(schema.min_length, schema.max_length, path)?;
                check_members(schema.enum_values.as_deref(), path, |value| {
                    let length = value.chars().count();
                    schema.min_length.is_none_or(|min| length >= min)
                        && schema.max_length.is_none_or(|max| length <= max)
                })
            }
            Self::Boolean | Self::Object(_) | Self::Array(_) => Ok(()),
        }
    }
}

fn check_bounds<T: PartialOrd>(
    minimum: Option<T>,
    maximum: Option<T>,
    path: &str,
) -> Result<(), SchemaError> {
    match (minimum, maximum) {
        (Some(min), Some(max)) if min > max => Err(invalid(path, "minimum exceeds maximum")),
        _ => Ok(()),
    }
}

fn check_members<T>(
    members: Option<&[T]>,
    path: &str,
    within: impl Fn(&T) -> bool,
) -> Result<(), SchemaError> {
    match members {
        Some(members) if members.is_empty() => Err(invalid(path, "enum must not be empty")),
        Some(members) if !members.iter().all(within) => {
            Err(invalid(path, "enum member violates the other constraints"))
        }
        _ => Ok(()),
    }
}
