//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http::{anthropic_headers, request_error, shared_client, status_to_error};
use super::{ModelClient, ModelRequest, ModelResponse};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::types::{ContentPart, Message, Role, ToolCallRequest, ToolResult};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: None,
        }
    }

    /// Build a client from configuration; an API key is required.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AgentError::InvalidConfig("ANTHROPIC_API_KEY is not set".into())
            })?;
        Ok(Self::new(api_key, config.base_url.clone()).with_timeout(config.call_timeout()))
    }

    /// Per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.settings.model,
            "max_tokens": request.settings.max_tokens,
            "temperature": request.settings.temperature,
            "messages": build_messages(&request.messages),
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(system) = &request.settings.system_prompt {
                obj.insert("system".into(), system.clone().into());
            }
            if !request.tools.is_empty() {
                let tools: Vec<serde_json::Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.input_schema,
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tools.into());
            }
        }

        body
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Convert history into Messages API turns.
///
/// Consecutive tool-role messages collapse into one user turn of
/// `tool_result` blocks.
fn build_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    let mut out: Vec<serde_json::Value> = Vec::new();
    let mut merging_results = false;

    for msg in messages {
        match msg.role {
            Role::User => {
                out.push(serde_json::json!({
                    "role": "user",
                    "content": [{"type": "text", "text": msg.text()}],
                }));
                merging_results = false;
            }
            Role::Assistant => {
                let content: Vec<serde_json::Value> = msg
                    .content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } if !text.is_empty() => {
                            Some(serde_json::json!({"type": "text", "text": text}))
                        }
                        ContentPart::ToolCall(tc) => {
                            let input = if tc.arguments.is_null() {
                                serde_json::json!({})
                            } else {
                                tc.arguments.clone()
                            };
                            Some(serde_json::json!({
                                "type": "tool_use",
                                "id": tc.id,
                                "name": tc.name,
                                "input": input,
                            }))
                        }
                        _ => None,
                    })
                    .collect();
                if !content.is_empty() {
                    out.push(serde_json::json!({"role": "assistant", "content": content}));
                }
                merging_results = false;
            }
            Role::Tool => {
                let Some(tr) = msg.tool_result_content() else {
                    continue;
                };
                let block = serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tr.tool_call_id,
                    "content": tool_result_text(&tr.result),
                    "is_error": tr.result.is_error(),
                });
                if merging_results {
                    if let Some(blocks) = out
                        .last_mut()
                        .and_then(|last| last.get_mut("content"))
                        .and_then(|c| c.as_array_mut())
                    {
                        blocks.push(block);
                        continue;
                    }
                }
                out.push(serde_json::json!({"role": "user", "content": [block]}));
                merging_results = true;
            }
        }
    }

    out
}

fn tool_result_text(result: &ToolResult) -> String {
    match result.to_model_value() {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

fn parse_response(data: AnthropicResponse) -> Result<ModelResponse> {
    let mut text = String::new();
    let mut calls = Vec::new();

    for block in data.content {
        match block.r#type.as_str() {
            "text" => {
                if let Some(t) = block.text {
                    text.push_str(&t);
                }
            }
            "tool_use" => {
                let (Some(id), Some(name)) = (block.id, block.name) else {
                    return Err(AgentError::ModelProtocol(
                        "tool_use block without id or name".into(),
                    ));
                };
                calls.push(ToolCallRequest::new(
                    id,
                    name,
                    block.input.unwrap_or(serde_json::Value::Null),
                ));
            }
            _ => {}
        }
    }

    if !calls.is_empty() {
        return Ok(ModelResponse::ToolCallsRequested { text, calls });
    }
    if text.trim().is_empty() {
        return Err(AgentError::ModelProtocol(format!(
            "model returned an empty response (stop_reason: {})",
            data.stop_reason.as_deref().unwrap_or("none")
        )));
    }
    Ok(ModelResponse::FinalAnswer(text))
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = %request.settings.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Anthropic send"
        );

        let mut builder = shared_client()
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder.send().await.map_err(request_error)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: AnthropicResponse = resp.json().await.map_err(request_error)?;
        parse_response(data)
    }
}

// Internal Anthropic response types

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}
