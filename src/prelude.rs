//! Convenience re-exports for common use.

pub use crate::agent::{AssistantAnswer, CancelHandle, Session, TurnFailure, TurnState};
pub use crate::config::AgentConfig;
pub use crate::error::{AgentError, Result};
pub use crate::model::{AnthropicClient, ModelClient, ModelRequest, ModelResponse};
pub use crate::tools::{ParameterSchema, ToolArguments, ToolDefinition, ToolRegistry, ToolSpec};
pub use crate::transport::{LocalTransport, ToolTransport};
pub use crate::types::{Message, Role, ToolCallRequest, ToolResult};
