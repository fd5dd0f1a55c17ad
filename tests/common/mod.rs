//! Shared test helpers and a scripted model.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use toolloop::config::AgentConfig;
use toolloop::error::{AgentError, Result};
use toolloop::model::{ModelClient, ModelRequest, ModelResponse};
use toolloop::tools::{ParameterSchema, ToolDefinition, ToolRegistry};
use toolloop::transport::LocalTransport;
use toolloop::types::ToolCallRequest;

/// A model that replays queued responses and records every request it saw.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn answer(self, text: &str) -> Self {
        self.push(Ok(ModelResponse::FinalAnswer(text.to_string())))
    }

    pub fn tool_call(self, id: &str, name: &str, args: serde_json::Value) -> Self {
        self.tool_calls(vec![ToolCallRequest::new(id, name, args)])
    }

    pub fn tool_calls(self, calls: Vec<ToolCallRequest>) -> Self {
        self.push(Ok(ModelResponse::ToolCallsRequested {
            text: String::new(),
            calls,
        }))
    }

    pub fn error(self, error: AgentError) -> Self {
        self.push(Err(error))
    }

    fn push(self, response: Result<ModelResponse>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::ModelProtocol("script exhausted".into())))
    }
}

/// `sum(a: integer, b: integer)` returning `a + b`.
pub fn sum_tool() -> ToolDefinition {
    ToolDefinition::new(
        "sum",
        "Add two integers",
        ParameterSchema::object()
            .integer("a", "First addend", true)
            .integer("b", "Second addend", true)
            .build(),
        |args| async move {
            let a = args.get_i64("a")?;
            let b = args.get_i64("b")?;
            Ok(json!(a + b))
        },
    )
}

/// `sleep(ms: integer)` that waits and then echoes `ms`.
pub fn sleep_tool() -> ToolDefinition {
    ToolDefinition::new(
        "sleep",
        "Wait for a number of milliseconds",
        ParameterSchema::object()
            .integer("ms", "Milliseconds to wait", true)
            .build(),
        |args| async move {
            let ms = args.get_i64("ms")?;
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok(json!(ms))
        },
    )
}

pub fn registry_with(tools: Vec<ToolDefinition>) -> Arc<ToolRegistry> {
    let registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

pub fn local_transport(tools: Vec<ToolDefinition>) -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(registry_with(tools)))
}

/// Defaults with fast retries, suitable for paused-time tests.
pub fn test_config() -> AgentConfig {
    AgentConfig::builder()
        .retry_backoff_ms(10)
        .call_timeout_ms(1_000)
        .build()
}
