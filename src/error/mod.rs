//! Error types for toolloop.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all toolloop operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),

    #[error("Invalid tool definition '{name}': {message}")]
    InvalidToolDefinition { name: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool_name}': {message}")]
    Validation { tool_name: String, message: String },

    #[error("Tool '{tool_name}' failed: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model protocol error: {0}")]
    ModelProtocol(String),

    #[error("Turn exceeded the limit of {limit} tool round trip(s)")]
    TurnLimitExceeded { limit: u32 },

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a validation error for a tool.
    pub fn validation(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool_execution(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig(_) => ErrorCategory::Configuration,
            Self::DuplicateToolName(_) | Self::InvalidToolDefinition { .. } => {
                ErrorCategory::Registration
            }
            Self::UnknownTool(_) | Self::Validation { .. } | Self::ToolExecution { .. } => {
                ErrorCategory::Tool
            }
            Self::ModelUnavailable(_) => ErrorCategory::ModelUnavailable,
            Self::ModelProtocol(_) => ErrorCategory::ModelProtocol,
            Self::TurnLimitExceeded { .. } => ErrorCategory::TurnLimit,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Transport(_) | Self::SessionClosed => ErrorCategory::Transport,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::Io,
        }
    }

    /// Whether the model call that produced this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::ModelUnavailable)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Registration | ErrorCategory::Tool => {
                RecoverySuggestion::CheckToolImplementation
            }
            ErrorCategory::ModelUnavailable => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::TurnLimit => RecoverySuggestion::RaiseTurnLimit,
            ErrorCategory::Cancelled => RecoverySuggestion::Resubmit,
            ErrorCategory::Transport => RecoverySuggestion::Reconnect,
            ErrorCategory::ModelProtocol | ErrorCategory::Io => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
