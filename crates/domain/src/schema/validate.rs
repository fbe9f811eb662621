use serde_json::Value as Json;

use super::{
    ArraySchema, IntegerSchema, NumberSchema, ObjectSchema, StringSchema, ValueSchema, child_path,
    index_path,
};
use crate::error::ValidationError;
use crate::value::{Value, ValueMap};

impl ObjectSchema {
    /// Validate a JSON object and return its typed form.
    ///
    /// Absent properties with a default are filled in. Unknown keys are
    /// dropped when `additional_properties` is set.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, naming the offending
    /// field by its dotted path.
    pub fn validate(&self, input: &Json) -> Result<ValueMap, ValidationError> {
        self.validate_at(input, "")
    }

    pub(crate) fn validate_at(&self, input: &Json, path: &str) -> Result<ValueMap, ValidationError> {
        let map = input
            .as_object()
            .ok_or_else(|| ValidationError::TypeMismatch(path.to_string()))?;

        let mut output = ValueMap::new();
        for (key, value) in map {
            let field = child_path(path, key);
            match self.properties.get(key) {
                Some(property) => {
                    output.insert(key.clone(), property.schema.validate(value, &field)?);
                }
                None if self.additional_properties => {}
                None => return Err(ValidationError::UnexpectedField(field)),
            }
        }

        for (key, property) in &self.properties {
            if output.contains_key(key) {
                continue;
            }
            if let Some(default) = &property.default {
                output.insert(key.clone(), default.clone());
            } else if !property.optional {
                return Err(ValidationError::MissingField(child_path(path, key)));
            }
        }

        Ok(output)
    }
}

impl ValueSchema {
    /// Validate a single JSON value located at `path`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in the value or its
    /// children.
    pub fn validate(&self, input: &Json, path: &str) -> Result<Value, ValidationError> {
        match self {
            Self::Boolean => input
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| ValidationError::TypeMismatch(path.to_string())),
            Self::Integer(schema) => schema.validate(input, path).map(Value::Int),
            Self::Number(schema) => schema.validate(input, path).map(Value::Number),
            Self::String(schema) => schema.validate(input, path).map(Value::String),
            Self::Object(schema) => schema.validate_at(input, path).map(Value::Object),
            Self::Array(schema) => schema.validate(input, path).map(Value::Array),
        }
    }
}

impl IntegerSchema {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn validate(&self, input: &Json, path: &str) -> Result<i64, ValidationError> {
        let Json::Number(number) = input else {
            return Err(ValidationError::TypeMismatch(path.to_string()));
        };
        let value = if let Some(value) = number.as_i64() {
            value
        } else if number.is_u64() {
            return Err(ValidationError::OutOfRange(path.to_string()));
        } else {
            let float = number.as_f64().unwrap_or(f64::NAN);
            if float.fract() != 0.0 {
                return Err(ValidationError::TypeMismatch(path.to_string()));
            }
            if float < i64::MIN as f64 || float >= i64::MAX as f64 {
                return Err(ValidationError::OutOfRange(path.to_string()));
            }
            float as i64
        };

        if self.minimum.is_some_and(|min| value < min) || self.maximum.is_some_and(|max| value > max) {
            return Err(ValidationError::OutOfRange(path.to_string()));
        }
        if self
            .enum_values
            .as_ref()
            .is_some_and(|values| !values.contains(&value))
        {
            return Err(ValidationError::NotInEnum(path.to_string()));
        }
        Ok(value)
    }
}

impl NumberSchema {
    #[allow(clippy::float_cmp)]
    fn validate(&self, input: &Json, path: &str) -> Result<f64, ValidationError> {
        let value = input
            .as_f64()
            .ok_or_else(|| ValidationError::TypeMismatch(path.to_string()))?;
        if self.minimum.is_some_and(|min| value < min) || self.maximum.is_some_and(|max| value > max) {
            return Err(ValidationError::OutOfRange(path.to_string()));
        }
        if self
            .enum_values
            .as_ref()
            .is_some_and(|values| !values.iter().any(|member| *member == value))
        {
            return Err(ValidationError::NotInEnum(path.to_string()));
        }
        Ok(value)
    }
}

impl StringSchema {
    fn validate(&self, input: &Json, path: &str) -> Result<String, ValidationError> {
        let value = input
            .as_str()
            .ok_or_else(|| ValidationError::TypeMismatch(path.to_string()))?;
        let length = value.chars().count();
        if self.min_length.is_some_and(|min| length < min)
            || self.max_length.is_some_and(|max| length > max)
        {
            return Err(ValidationError::OutOfRange(path.to_string()));
        }
        if self
            .enum_values
            .as_ref()
            .is_some_and(|values| !values.iter().any(|member| member == value))
        {
            return Err(ValidationError::NotInEnum(path.to_string()));
        }
        Ok(value.to_string())
    }
}

impl ArraySchema {
    fn validate(&self, input: &Json, path: &str) -> Result<Vec<Value>, ValidationError> {
        let items = input
            .as_array()
            .ok_or_else(|| ValidationError::TypeMismatch(path.to_string()))?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let item_path = index_path(path, index);
                match &self.items {
                    Some(schema) => schema.validate(item, &item_path),
                    None => Value::from_json(item, &item_path),
                }
            })
            .collect()
    }
}
