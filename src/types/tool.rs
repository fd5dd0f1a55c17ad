//! Tool call requests and results exchanged between model, orchestrator and transport.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AgentError;

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: serde_json::Value },
    Failure(ToolFailure),
}

impl ToolResult {
    pub fn success(payload: serde_json::Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self::Failure(ToolFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn as_success(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure(_) => None,
        }
    }

    /// Failure descriptor, if this result is a failure.
    pub fn as_failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            Self::Success { .. } => None,
        }
    }

    /// Value presented to the model for this result.
    pub fn to_model_value(&self) -> serde_json::Value {
        match self {
            Self::Success { payload } => payload.clone(),
            Self::Failure(failure) => serde_json::json!({
                "error": failure.message,
                "kind": failure.kind.to_string(),
            }),
        }
    }
}

impl From<AgentError> for ToolResult {
    fn from(error: AgentError) -> Self {
        Self::Failure(ToolFailure::from_error(&error))
    }
}

/// Failure descriptor carried by a failed [`ToolResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

impl ToolFailure {
    /// Map an error raised below the transport boundary to a failure descriptor.
    pub fn from_error(error: &AgentError) -> Self {
        let (kind, message) = match error {
            AgentError::UnknownTool(name) => {
                (ToolFailureKind::UnknownTool, format!("Tool '{name}' not found"))
            }
            AgentError::Validation { .. } => (ToolFailureKind::Validation, error.to_string()),
            AgentError::ToolExecution { message, .. } => {
                (ToolFailureKind::Execution, message.clone())
            }
            AgentError::Cancelled => (ToolFailureKind::Cancelled, "tool call cancelled".into()),
            AgentError::Transport(_) | AgentError::SessionClosed => {
                (ToolFailureKind::Transport, error.to_string())
            }
            other => (ToolFailureKind::Execution, other.to_string()),
        };
        Self { kind, message }
    }
}

/// Failure kind reported back to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolFailureKind {
    UnknownTool,
    Validation,
    Execution,
    Transport,
    Timeout,
    Cancelled,
}
