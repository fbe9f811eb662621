use serde_json::{Map, Value as Json};

use super::{
    ArraySchema, IntegerSchema, NumberSchema, ObjectSchema, PropertySchema, StringSchema,
    ValueSchema,
};

impl ObjectSchema {
    /// Render the property map in declarative form.
    ///
    /// With `full` unset and a `base`, only what differs from the base is
    /// emitted: unchanged properties are omitted and overridden ones carry
    /// only the changed constraints. Building the output over the same base
    /// yields this schema again.
    #[must_use]
    pub fn to_json(&self, full: bool, base: Option<&ObjectSchema>) -> Json {
        let base = base.filter(|_| !full);
        let mut out = Map::new();
        for (name, property) in &self.properties {
            match base.and_then(|base| base.properties.get(name)) {
                Some(base_property) => {
                    if let Some(delta) = property.delta_json(base_property) {
                        out.insert(name.clone(), delta);
                    }
                }
                None => {
                    out.insert(name.clone(), property.to_json());
                }
            }
        }
        Json::Object(out)
    }
}

impl PropertySchema {
    /// Complete declarative form; bare type names where nothing else is set.
    #[must_use]
    pub fn to_json(&self) -> Json {
        if self.default.is_none() && !self.optional {
            return self.schema.to_json();
        }
        let mut out = self.schema.full_map();
        if let Some(default) = &self.default {
            out.insert("default".to_string(), default.to_json());
        }
        if self.optional {
            out.insert("isRequired".to_string(), Json::Bool(false));
        }
        Json::Object(out)
    }

    fn delta_json(&self, base: &PropertySchema) -> Option<Json> {
        if self == base {
            return None;
        }
        if self.schema.value_type() != base.schema.value_type() {
            return Some(self.to_json());
        }
        let mut out = self.schema.delta_map(&base.schema);
        if self.default != base.default {
            if let Some(default) = &self.default {
                out.insert("default".to_string(), default.to_json());
            }
        }
        if self.optional != base.optional {
            out.insert("isRequired".to_string(), Json::Bool(!self.optional));
        }
        Some(Json::Object(out))
    }
}

impl ValueSchema {
    /// Complete declarative form of a bare value schema.
    #[must_use]
    pub fn to_json(&self) -> Json {
        if self.is_unconstrained() {
            Json::String(self.value_type().as_str().to_string())
        } else {
            Json::Object(self.full_map())
        }
    }

    fn is_unconstrained(&self) -> bool {
        match self {
            Self::Boolean => true,
            Self::Integer(schema) => *schema == IntegerSchema::default(),
            Self::Number(schema) => *schema == NumberSchema::default(),
            Self::String(schema) => *schema == StringSchema::default(),
            Self::Array(schema) => schema.items.is_none(),
            Self::Object(_) => false,
        }
    }

    fn full_map(&self) -> Map<String, Json> {
        let mut out = Map::new();
        out.insert(
            "type".to_string(),
            Json::String(self.value_type().as_str().to_string()),
        );
        match self {
            Self::Boolean => {}
            Self::Integer(schema) => {
                put(&mut out, "minimum", schema.minimum.map(Json::from));
                put(&mut out, "maximum", schema.maximum.map(Json::from));
                put(&mut out, "enum", schema.enum_values.clone().map(Json::from));
            }
            Self::Number(schema) => {
                put(&mut out, "minimum", schema.minimum.map(number));
                put(&mut out, "maximum", schema.maximum.map(number));
                put(&mut out, "enum", numbers(schema.enum_values.as_deref()));
            }
            Self::String(schema) => {
                put(&mut out, "minLength", schema.min_length.map(Json::from));
                put(&mut out, "maxLength", schema.max_length.map(Json::from));
                put(&mut out, "enum", schema.enum_values.clone().map(Json::from));
            }
            Self::Array(ArraySchema { items }) => {
                put(&mut out, "items", items.as_deref().map(Self::to_json));
            }
            Self::Object(schema) => {
                out.insert("properties".to_string(), schema.to_json(true, None));
                out.insert(
                    "additionalProperties".to_string(),
                    Json::Bool(schema.additional_properties),
                );
            }
        }
        out
    }

    /// Constraints of `self` that differ from `base`, which has the same type.
    fn delta_map(&self, base: &ValueSchema) -> Map<String, Json> {
        let mut out = Map::new();
        match (self, base) {
            (Self::Integer(schema), Self::Integer(base)) => {
                put_changed(&mut out, "minimum", &schema.minimum, &base.minimum, |n| Json::from(*n));
                put_changed(&mut out, "maximum", &schema.maximum, &base.maximum, |n| Json::from(*n));
                put_changed(&mut out, "enum", &schema.enum_values, &base.enum_values, |values| {
                    Json::from(values.clone())
                });
            }
            (Self::Number(schema), Self::Number(base)) => {
                put_changed(&mut out, "minimum", &schema.minimum, &base.minimum, |n| number(*n));
                put_changed(&mut out, "maximum", &schema.maximum, &base.maximum, |n| number(*n));
                if schema.enum_values != base.enum_values {
                    put(&mut out, "enum", numbers(schema.enum_values.as_deref()));
                }
            }
            (Self::String(schema), Self::String(base)) => {
                put_changed(&mut out, "minLength", &schema.min_length, &base.min_length, |n| Json::from(*n));
                put_changed(&mut out, "maxLength", &schema.max_length, &base.max_length, |n| Json::from(*n));
                put_changed(&mut out, "enum", &schema.enum_values, &base.enum_values, |values| {
                    Json::from(values.clone())
                });
            }
            (Self::Array(schema), Self::Array(base)) => {
                if schema.items != base.items {
                    let items = match (schema.items.as_deref(), base.items.as_deref()) {
                        (Some(items), Some(base_items)) if items.value_type() == base_items.value_type() => {
                            Some(Json::Object(items.delta_map(base_items)))
                        }
                        (items, _) => items.map(Self::to_json),
                    };
                    put(&mut out, "items", items);
                }
            }
            (Self::Object(schema), Self::Object(base)) => {
                let properties = schema.to_json(false, Some(base));
                if properties.as_object().is_some_and(|map| !map.is_empty()) {
                    out.insert("properties".to_string(), properties);
                }
                if schema.additional_properties != base.additional_properties {
                    out.insert(
                        "additionalProperties".to_string(),
                        Json::Bool(schema.additional_properties),
                    );
                }
            }
            _ => {}
        }
        out
    }
}

fn put(out: &mut Map<String, Json>, key: &str, value: Option<Json>) {
    if let Some(value) = value {
        out.insert(key.to_string(), value);
    }
}

fn put_changed<T: PartialEq>(
    out: &mut Map<String, Json>,
    key: &str,
    value: &Option<T>,
    base: &Option<T>,
    render: impl Fn(&T) -> Json,
) {
    if value != base {
        put(out, key, value.as_ref().map(render));
    }
}

fn number(value: f64) -> Json {
    serde_json::Number::from_f64(value).map_or(Json::Null, Json::Number)
}

fn numbers(values: Option<&[f64]>) -> Option<Json> {
    values.map(|values| Json::Array(values.iter().copied().map(number).collect()))
}
