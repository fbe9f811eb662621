//! Typed values produced by schema validation.
//!
//! Untrusted input arrives as `serde_json::Value`. Validation classifies it
//! once against a schema and yields a [`Value`] tree, so code past the trust
//! boundary never inspects raw JSON again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ValidationError;
use crate::schema::{child_path, index_path};

/// Named children of an object value.
pub type ValueMap = BTreeMap<String, Value>;

/// A single schema-conforming value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(ValueMap),
}

impl Value {
    /// Convert arbitrary JSON into a value without a schema.
    ///
    /// Used where no schema is declared (e.g. a command without a progress
    /// schema). `null` has no typed counterpart and is rejected, and so is an
    /// integer too large for [`Value::Int`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] at the path of the first
    /// `null` found, or [`ValidationError::OutOfRange`] at the path of an
    /// integer above `i64::MAX`.
    pub fn from_json(json: &Json, path: &str) -> Result<Self, ValidationError> {
        match json {
            Json::Null => Err(ValidationError::TypeMismatch(path.to_string())),
            Json::Bool(b) => Ok(Self::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None if n.is_u64() => Err(ValidationError::OutOfRange(path.to_string())),
                None => Ok(Self::Number(n.as_f64().unwrap_or_default())),
            },
            Json::String(s) => Ok(Self::String(s.clone())),
            Json::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| Self::from_json(item, &index_path(path, index)))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            Json::Object(map) => map
                .iter()
                .map(|(key, item)| {
                    Self::from_json(item, &child_path(path, key))
                        .map(|value| (key.clone(), value))
                })
                .collect::<Result<ValueMap, _>>()
                .map(Self::Object),
        }
    }

    /// Render back to plain JSON.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Json::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Render a value map as a JSON object.
#[must_use]
pub fn map_to_json(map: &ValueMap) -> Json {
    Json::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_classify_integral_numbers_as_int() {
        let value = Value::from_json(&json!(42), "n").unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn should_classify_fractional_numbers_as_number() {
        let value = Value::from_json(&json!(21.5), "n").unwrap();
        assert_eq!(value, Value::Number(21.5));
    }

    #[test]
    fn should_reject_integer_above_i64_range() {
        let result = Value::from_json(&json!({"_done": [1, u64::MAX]}), "");
        assert_eq!(
            result,
            Err(ValidationError::OutOfRange("_done[1]".to_string()))
        );
        assert_eq!(
            Value::from_json(&json!(i64::MAX), "n"),
            Ok(Value::Int(i64::MAX))
        );
    }

    #[test]
    fn should_reject_nested_null_with_its_path() {
        let result = Value::from_json(&json!({"_a": {"_b": [1, null]}}), "");
        assert_eq!(
            result,
            Err(ValidationError::TypeMismatch("_a._b[1]".to_string()))
        );
    }

    #[test]
    fn should_render_back_to_the_same_json() {
        let input = json!({"_leds": [true, false], "_name": "Bob", "_n": 3});
        let value = Value::from_json(&input, "").unwrap();
        assert_eq!(value.to_json(), input);
    }

    #[test]
    fn should_serialize_untagged() {
        let json = serde_json::to_string(&Value::String("hello".to_string())).unwrap();
        assert_eq!(json, "\"hello\"");
    }

    #[test]
    fn should_widen_int_to_f64() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }
}
