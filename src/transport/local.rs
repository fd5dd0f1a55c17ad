//! In-process transport over a [`ToolRegistry`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::{ConnectionState, ToolTransport};
use crate::error::{AgentError, Result};
use crate::tools::{ToolRegistry, ToolSpec};
use crate::types::{ToolCallRequest, ToolFailureKind, ToolResult};

/// Transport that dispatches directly into a shared registry.
#[derive(Debug)]
pub struct LocalTransport {
    registry: Arc<ToolRegistry>,
    state: Mutex<ConnectionState>,
}

impl LocalTransport {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ToolTransport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    fn is_alive(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    async fn open(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ConnectionState::Closed => Err(AgentError::Transport("local transport is closed".into())),
            ConnectionState::Open => Ok(()),
            ConnectionState::Idle => {
                *state = ConnectionState::Open;
                debug!(tools = self.registry.len(), "local transport opened");
                Ok(())
            }
        }
    }

    async fn discover(&self) -> Result<Vec<ToolSpec>> {
        match self.connection_state() {
            ConnectionState::Open => Ok(self.registry.list_definitions()),
            other => Err(AgentError::Transport(format!(
                "cannot discover tools while transport is {other:?}"
            ))),
        }
    }

    async fn call(&self, request: &ToolCallRequest) -> ToolResult {
        if self.connection_state() != ConnectionState::Open {
            return ToolResult::failure(
                ToolFailureKind::Transport,
                "local transport is not open",
            );
        }
        match self
            .registry
            .invoke(&request.name, request.arguments.clone())
            .await
        {
            Ok(payload) => ToolResult::success(payload),
            Err(error) => error.into(),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != ConnectionState::Closed {
            *state = ConnectionState::Closed;
            debug!("local transport closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterSchema, ToolDefinition};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn transport() -> LocalTransport {
        let registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new(
                "echo",
                "Echo the input",
                ParameterSchema::object().string("text", "text", true).build(),
                |args| async move { Ok(json!(args.get_str("text")?)) },
            ))
            .unwrap();
        LocalTransport::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn call_returns_success_payload() {
        let transport = transport();
        transport.open().await.unwrap();

        let result = transport
            .call(&ToolCallRequest::new("c1", "echo", json!({"text": "hi"})))
            .await;

        assert_eq!(result, ToolResult::success(json!("hi")));
    }

    #[tokio::test]
    async fn registry_errors_become_failure_results() {
        let transport = transport();
        transport.open().await.unwrap();

        let unknown = transport
            .call(&ToolCallRequest::new("c1", "nope", json!({})))
            .await;
        let invalid = transport
            .call(&ToolCallRequest::new("c2", "echo", json!({"text": 1})))
            .await;

        assert_eq!(unknown.as_failure().unwrap().kind, ToolFailureKind::UnknownTool);
        assert_eq!(invalid.as_failure().unwrap().kind, ToolFailureKind::Validation);
    }

    #[tokio::test]
    async fn discover_reflects_later_registrations() {
        let transport = transport();
        transport.open().await.unwrap();
        assert_eq!(transport.discover().await.unwrap().len(), 1);

        transport
            .registry()
            .register(ToolDefinition::new(
                "noop",
                "",
                ParameterSchema::empty(),
                |_| async { Ok(json!(null)) },
            ))
            .unwrap();

        assert_eq!(transport.discover().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_calls() {
        let transport = transport();
        transport.close().await.unwrap();
        transport.open().await.unwrap_err();
        transport.close().await.unwrap();

        let result = transport
            .call(&ToolCallRequest::new("c1", "echo", json!({"text": "hi"})))
            .await;

        assert_eq!(result.as_failure().unwrap().kind, ToolFailureKind::Transport);
        assert_eq!(transport.connection_state(), ConnectionState::Closed);
        assert!(!transport.is_alive());
    }
}
