//! Caller-authored parameter schemas and argument validation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

/// Ordered parameter schema for a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    /// A schema with no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            parameters: Vec::new(),
        }
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check the schema itself for consistency.
    pub fn check(&self) -> Result<(), String> {
        for (idx, param) in self.parameters.iter().enumerate() {
            if param.name.is_empty() {
                return Err("parameter names must not be empty".into());
            }
            if self.parameters[..idx].iter().any(|p| p.name == param.name) {
                return Err(format!("parameter '{}' is declared twice", param.name));
            }
            if let Some(default) = &param.default {
                if param.required {
                    return Err(format!(
                        "required parameter '{}' cannot declare a default",
                        param.name
                    ));
                }
                if !param.param_type.matches(default) {
                    return Err(format!(
                        "default for '{}' is {}, expected {}",
                        param.name,
                        json_type_name(default),
                        param.param_type
                    ));
                }
                check_allowed(param, default)?;
            }
        }
        Ok(())
    }

    /// Validate call arguments and return them with declared defaults filled in.
    ///
    /// `null` is treated as an empty argument object, and a `null` optional
    /// field as an absent one. Unknown fields are rejected.
    pub fn validate(&self, args: &serde_json::Value) -> Result<serde_json::Value, String> {
        let mut obj = match args {
            serde_json::Value::Null => serde_json::Map::new(),
            serde_json::Value::Object(map) => map.clone(),
            other => {
                return Err(format!(
                    "expected object arguments, got {}",
                    json_type_name(other)
                ))
            }
        };

        if let Some(unexpected) = obj.keys().find(|key| self.get(key).is_none()) {
            return Err(format!("unexpected field '{unexpected}'"));
        }

        for param in &self.parameters {
            match obj.get(&param.name) {
                Some(serde_json::Value::Null) if !param.required => match &param.default {
                    Some(default) => {
                        obj.insert(param.name.clone(), default.clone());
                    }
                    None => {
                        obj.remove(&param.name);
                    }
                },
                Some(value) => {
                    if !param.param_type.matches(value) {
                        return Err(format!(
                            "field '{}' expected type '{}', got {}",
                            param.name,
                            param.param_type,
                            json_type_name(value)
                        ));
                    }
                    check_allowed(param, value)?;
                }
                None if param.required => {
                    return Err(format!("missing required field '{}'", param.name));
                }
                None => {
                    if let Some(default) = &param.default {
                        obj.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(serde_json::Value::Object(obj))
    }

    /// Render as a JSON Schema object for the model backend.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = serde_json::json!({
                "type": param.param_type.to_string(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            if let Some(values) = &param.allowed_values {
                prop["enum"] = serde_json::json!(values);
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(param.name.clone());
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn check_allowed(param: &ParameterSpec, value: &serde_json::Value) -> Result<(), String> {
    let (Some(allowed), Some(text)) = (&param.allowed_values, value.as_str()) else {
        return Ok(());
    };
    if allowed.iter().any(|candidate| candidate == text) {
        Ok(())
    } else {
        Err(format!(
            "field '{}' must be one of [{}], got '{text}'",
            param.name,
            allowed.join(", ")
        ))
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Builder for constructing tool parameter schemas.
pub struct ParameterBuilder {
    parameters: Vec<ParameterSpec>,
}

impl ParameterBuilder {
    fn push(
        mut self,
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            param_type,
            description: description.into(),
            required,
            default: None,
            allowed_values: None,
        });
        self
    }

    /// Add a string property.
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::String, description, required)
    }

    /// Add an integer property.
    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::Integer, description, required)
    }

    /// Add a number property.
    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::Number, description, required)
    }

    /// Add a boolean property.
    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::Boolean, description, required)
    }

    /// Add an array property.
    pub fn array(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::Array, description, required)
    }

    /// Add an object property.
    pub fn object(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.push(name, ParamType::Object, description, required)
    }

    /// Add an enum (string) property.
    pub fn string_enum(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        self = self.push(name, ParamType::String, description, required);
        if let Some(last) = self.parameters.last_mut() {
            last.allowed_values = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    /// Give the most recently added property a default; the property becomes optional.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        if let Some(last) = self.parameters.last_mut() {
            last.required = false;
            last.default = Some(value);
        }
        self
    }

    pub fn build(self) -> ParameterSchema {
        ParameterSchema {
            parameters: self.parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sum_schema() -> ParameterSchema {
        ParameterSchema::object()
            .integer("a", "first addend", true)
            .integer("b", "second addend", true)
            .build()
    }

    #[test]
    fn rejects_non_object_args() {
        let err = sum_schema().validate(&json!("not an object")).unwrap_err();

        assert!(err.contains("expected object"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = sum_schema().validate(&json!({ "a": 1 })).unwrap_err();

        assert!(err.contains("missing required field 'b'"));
    }

    #[test]
    fn rejects_field_with_wrong_type() {
        let err = sum_schema()
            .validate(&json!({ "a": "two", "b": 3 }))
            .unwrap_err();

        assert!(err.contains("field 'a'"));
        assert!(err.contains("expected type 'integer'"));
    }

    #[test]
    fn rejects_unexpected_field() {
        let err = sum_schema()
            .validate(&json!({ "a": 1, "b": 2, "c": 3 }))
            .unwrap_err();

        assert!(err.contains("unexpected field 'c'"));
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(sum_schema().validate(&json!({ "a": 1.5, "b": 2 })).is_err());
    }

    #[test]
    fn fills_defaults_for_absent_optional_fields() {
        let schema = ParameterSchema::object()
            .string("query", "search query", true)
            .integer("max_results", "result cap", false)
            .with_default(json!(10))
            .build();

        let args = schema.validate(&json!({ "query": "rust" })).unwrap();

        assert_eq!(args, json!({ "query": "rust", "max_results": 10 }));
    }

    #[test]
    fn null_optional_field_counts_as_absent() {
        let schema = ParameterSchema::object()
            .string("path", "target", true)
            .string("content", "body", false)
            .integer("limit", "cap", false)
            .with_default(json!(10))
            .build();

        let args = schema
            .validate(&json!({ "path": "/tmp", "content": null, "limit": null }))
            .unwrap();

        assert_eq!(args, json!({ "path": "/tmp", "limit": 10 }));
    }

    #[test]
    fn null_required_field_is_rejected() {
        let err = sum_schema()
            .validate(&json!({ "a": null, "b": 2 }))
            .unwrap_err();

        assert!(err.contains("field 'a'"));
    }

    #[test]
    fn null_args_accepted_for_empty_schema() {
        let args = ParameterSchema::empty()
            .validate(&serde_json::Value::Null)
            .unwrap();

        assert_eq!(args, json!({}));
    }

    #[test]
    fn enum_values_are_enforced() {
        let schema = ParameterSchema::object()
            .string_enum("op", "operation", &["read", "write"], true)
            .build();

        assert!(schema.validate(&json!({ "op": "read" })).is_ok());
        let err = schema.validate(&json!({ "op": "chmod" })).unwrap_err();
        assert!(err.contains("must be one of [read, write]"));
    }

    #[test]
    fn check_rejects_default_of_wrong_type() {
        let schema = ParameterSchema::object()
            .integer("limit", "cap", false)
            .with_default(json!("ten"))
            .build();

        let err = schema.check().unwrap_err();

        assert!(err.contains("default for 'limit'"));
    }

    #[test]
    fn check_rejects_duplicate_parameter() {
        let schema = ParameterSchema::object()
            .string("q", "first", true)
            .string("q", "second", false)
            .build();

        assert!(schema.check().unwrap_err().contains("declared twice"));
    }

    #[test]
    fn json_schema_lists_required_and_forbids_extras() {
        let schema = ParameterSchema::object()
            .string("code", "source", true)
            .string("language", "language", false)
            .with_default(json!("python"))
            .build()
            .to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["code"]));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["language"]["default"], "python");
        assert_eq!(schema["properties"]["code"]["type"], "string");
    }
}
