//! Typed access to tool call arguments.

use crate::error::AgentError;

/// Wrapper around validated tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    tool_name: Option<String>,
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            tool_name: None,
            value,
        }
    }

    /// Arguments bound to the tool they were validated for.
    pub fn for_tool(tool_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            value,
        }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Consume into the raw JSON value.
    pub fn into_raw(self) -> serde_json::Value {
        self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.missing("string", key))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| self.missing("integer", key))
    }

    /// Get an optional integer argument.
    pub fn get_i64_opt(&self, key: &str) -> Option<i64> {
        self.value.get(key).and_then(|v| v.as_i64())
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| self.missing("number", key))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| self.missing("boolean", key))
    }

    /// Get a nested object.
    pub fn get_object(&self, key: &str) -> Result<&serde_json::Value, AgentError> {
        self.value
            .get(key)
            .filter(|v| v.is_object())
            .ok_or_else(|| self.missing("object", key))
    }

    /// Get an array argument.
    pub fn get_array(&self, key: &str) -> Result<&Vec<serde_json::Value>, AgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| self.missing("array", key))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, AgentError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            AgentError::validation(
                self.tool_name(),
                format!("failed to deserialize arguments: {e}"),
            )
        })
    }

    fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or("unknown")
    }

    fn missing(&self, kind: &str, key: &str) -> AgentError {
        AgentError::validation(self.tool_name(), format!("missing {kind} argument '{key}'"))
    }
}
