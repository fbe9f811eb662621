//! Value schemas: typed, constrained definitions of command parameters,
//! progress/results payloads and state properties.
//!
//! A schema tree is classified once from its declarative JSON form
//! ([`ObjectSchema::from_json`]), then walked without further type inspection
//! by [`ObjectSchema::validate`]. [`ObjectSchema::to_json`] turns it back into
//! the declarative form, either complete or as a delta against a base schema.
//!
//! # Example
//!
//! ```
//! use devlink_domain::schema::{BuildOptions, ObjectSchema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::from_json(
//!     &json!({"_led": {"minimum": 1, "maximum": 3}, "_on": "boolean"}),
//!     None,
//!     BuildOptions::default(),
//! )
//! .unwrap();
//!
//! assert!(schema.validate(&json!({"_led": 2, "_on": true})).is_ok());
//! assert!(schema.validate(&json!({"_led": 4, "_on": true})).is_err());
//! ```

mod build;
mod to_json;
mod validate;

use std::collections::BTreeMap;
use std::fmt;

pub use build::BuildOptions;

use crate::value::Value;

/// The primitive or composite type of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
}

impl ValueType {
    /// Parse a declarative type name (`"integer"`, `"string"`, …).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type and constraints of a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSchema {
    Boolean,
    Integer(IntegerSchema),
    Number(NumberSchema),
    String(StringSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
}

impl ValueSchema {
    /// An unconstrained schema of the given type.
    #[must_use]
    pub fn unconstrained(value_type: ValueType, options: BuildOptions) -> Self {
        match value_type {
            ValueType::Boolean => Self::Boolean,
            ValueType::Integer => Self::Integer(IntegerSchema::default()),
            ValueType::Number => Self::Number(NumberSchema::default()),
            ValueType::String => Self::String(StringSchema::default()),
            ValueType::Object => Self::Object(ObjectSchema::empty(options)),
            ValueType::Array => Self::Array(ArraySchema::default()),
        }
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean => ValueType::Boolean,
            Self::Integer(_) => ValueType::Integer,
            Self::Number(_) => ValueType::Number,
            Self::String(_) => ValueType::String,
            Self::Object(_) => ValueType::Object,
            Self::Array(_) => ValueType::Array,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Self::Object(schema) => Some(schema),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArraySchema> {
        match self {
            Self::Array(schema) => Some(schema),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntegerSchema {
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub enum_values: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberSchema {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub enum_values: Option<Vec<f64>>,
}

/// String constraints; lengths count Unicode scalar values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringSchema {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub enum_values: Option<Vec<String>>,
}

/// Array of homogeneous items. Without an item schema any non-null
/// element is accepted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<ValueSchema>>,
}

/// One named child of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub schema: ValueSchema,
    /// Filled in when the property is absent from the input.
    pub default: Option<Value>,
    /// Declared `isRequired: false`.
    pub optional: bool,
}

impl PropertySchema {
    #[must_use]
    pub fn new(schema: ValueSchema) -> Self {
        Self {
            schema,
            default: None,
            optional: false,
        }
    }

    /// A property must be present unless it is optional or has a default.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// Named child schemas. Unknown keys are rejected unless
/// `additional_properties` is set, in which case they are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    properties: BTreeMap<String, PropertySchema>,
    pub additional_properties: bool,
}

impl ObjectSchema {
    #[must_use]
    pub fn empty(options: BuildOptions) -> Self {
        Self {
            properties: BTreeMap::new(),
            additional_properties: options.lenient_objects,
        }
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.properties
            .iter()
            .map(|(name, prop)| (name.as_str(), prop))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Dotted path of a child field; the root is the empty path.
pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}
