//! Model client trait and request/response types.

pub mod anthropic;
pub mod http;

pub use anthropic::AnthropicClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::tools::ToolSpec;
use crate::types::{Message, ToolCallRequest};

/// Sampling and identity settings sent with every model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl From<&AgentConfig> for GenerationSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

/// A request sent to a model backend.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub settings: GenerationSettings,
}

/// What the model decided to do with the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    FinalAnswer(String),
    /// One or more tool calls, with any preamble text the model produced.
    ToolCallsRequested {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
}

/// Backend that turns a conversation snapshot into the next model response.
///
/// Failures are `ModelUnavailable` (retryable) or `ModelProtocol` (fatal to the turn).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider name (e.g. "anthropic").
    fn provider_name(&self) -> &str;

    async fn send(&self, request: &ModelRequest) -> Result<ModelResponse>;
}
