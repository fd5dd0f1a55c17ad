//! Remote tools over the Model Context Protocol, via a child-process server.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, ErrorCode, JsonObject};
use rmcp::service::{DynService, RoleClient, RunningService, ServiceError, ServiceExt};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ToolTransport;
use crate::error::{AgentError, Result};
use crate::tools::ToolSpec;
use crate::types::{ToolCallRequest, ToolFailureKind, ToolResult};

type DynClientService = Box<dyn DynService<RoleClient>>;
type McpRunningService = RunningService<RoleClient, DynClientService>;

enum Connection {
    Idle,
    Open(McpRunningService),
    Closed,
}

/// Transport that spawns an MCP server and talks to it over stdio.
///
/// All requests share one session, so calls are serialized.
pub struct McpTransport {
    command: String,
    args: Vec<String>,
    connection: Mutex<Connection>,
    alive: AtomicBool,
}

impl McpTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            connection: Mutex::new(Connection::Idle),
            alive: AtomicBool::new(false),
        }
    }

    /// Parse a shell-like command line (`"python server.py"`) into command and args.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let command = parts
            .next()
            .ok_or_else(|| AgentError::InvalidConfig("MCP server command is empty".into()))?;
        Ok(Self::new(command, parts.collect()))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn note_failure(&self, error: &ServiceError) {
        if matches!(error, ServiceError::TransportClosed) {
            warn!(command = %self.command, "MCP server went away");
            self.alive.store(false, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for McpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTransport")
            .field("command", &self.command)
            .field("args", &self.args)
            .finish()
    }
}

#[async_trait]
impl ToolTransport for McpTransport {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn open(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        match &*connection {
            Connection::Open(_) => return Ok(()),
            Connection::Closed => return Err(AgentError::Transport("MCP transport closed".into())),
            Connection::Idle => {}
        }

        let mut command = Command::new(&self.command);
        command.args(&self.args);
        let transport = TokioChildProcess::new(command)
            .map_err(|e| AgentError::Transport(format!("failed to spawn MCP server: {e}")))?;
        let session = ClientInfo::default()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(|e| AgentError::Transport(format!("MCP initialize failed: {e}")))?;

        debug!(command = %self.command, "MCP session established");
        *connection = Connection::Open(session);
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<ToolSpec>> {
        let connection = self.connection.lock().await;
        let Connection::Open(session) = &*connection else {
            return Err(AgentError::Transport("MCP transport is not open".into()));
        };

        let tools = match session.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                session
                    .list_tools(None)
                    .await
                    .map_err(|e| {
                        self.note_failure(&e);
                        map_service_error("list_tools", e)
                    })?
                    .tools
            }
            Err(e) => {
                self.note_failure(&e);
                return Err(map_service_error("list_tools", e));
            }
        };

        Ok(tools.into_iter().map(map_tool_spec).collect())
    }

    async fn call(&self, request: &ToolCallRequest) -> ToolResult {
        let arguments = match coerce_arguments(&request.arguments) {
            Ok(arguments) => arguments,
            Err(message) => return ToolResult::failure(ToolFailureKind::Validation, message),
        };

        let connection = self.connection.lock().await;
        let Connection::Open(session) = &*connection else {
            return ToolResult::failure(ToolFailureKind::Transport, "MCP transport is not open");
        };

        let outcome = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: request.name.clone().into(),
                arguments,
                task: None,
            })
            .await;

        match outcome {
            Ok(result) => map_call_result(result),
            Err(error) => {
                self.note_failure(&error);
                call_failure(error)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        self.alive.store(false, Ordering::SeqCst);
        let previous = std::mem::replace(&mut *connection, Connection::Closed);
        if let Connection::Open(session) = previous {
            if let Err(e) = session.cancel().await {
                warn!(error = %e, "MCP session did not shut down cleanly");
            }
            debug!(command = %self.command, "MCP session closed");
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn supports_concurrent_calls(&self) -> bool {
        false
    }
}

fn map_tool_spec(tool: rmcp::model::Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_arguments(value: &serde_json::Value) -> std::result::Result<Option<JsonObject>, String> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map.clone())),
        other => Err(format!("tool arguments must be a JSON object; got {other}")),
    }
}

fn text_content(content: &[Content]) -> Option<String> {
    let lines: Vec<String> = content
        .iter()
        .filter_map(|item| item.as_text().map(|text| text.text.clone()))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(result: CallToolResult) -> ToolResult {
    let text = text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or(text)
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return ToolResult::failure(ToolFailureKind::Execution, message);
    }

    if let Some(structured) = result.structured_content {
        return ToolResult::success(structured);
    }
    match text {
        // FastMCP-style servers serialize dict results as JSON text.
        Some(text) => ToolResult::success(
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
        ),
        None => ToolResult::success(serde_json::Value::Array(
            result
                .content
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect(),
        )),
    }
}

fn call_failure(error: ServiceError) -> ToolResult {
    match error {
        ServiceError::McpError(error) if error.code.0 == ErrorCode::INVALID_PARAMS.0 => {
            ToolResult::failure(ToolFailureKind::Validation, error.message.to_string())
        }
        ServiceError::McpError(error) => ToolResult::failure(
            ToolFailureKind::Execution,
            format!("MCP error {}: {}", error.code.0, error.message),
        ),
        ServiceError::Timeout { timeout } => ToolResult::failure(
            ToolFailureKind::Timeout,
            format!("MCP call timed out after {}ms", timeout.as_millis()),
        ),
        other => ToolResult::from(map_service_error("call_tool", other)),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> AgentError {
    match error {
        ServiceError::McpError(error) => AgentError::Transport(format!(
            "{context}: MCP error {}: {}",
            error.code.0, error.message
        )),
        ServiceError::TransportClosed => {
            AgentError::Transport(format!("{context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            AgentError::Transport(format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            AgentError::Transport(format!("{context}: MCP request cancelled{suffix}"))
        }
        other => AgentError::Transport(format!("{context}: MCP service error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn command_line_is_split_into_command_and_args() {
        let transport = McpTransport::from_command_line("python -m server --stdio").unwrap();

        assert_eq!(transport.command(), "python");
        assert_eq!(transport.args(), ["-m", "server", "--stdio"]);
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let err = McpTransport::from_command_line("   ").unwrap_err();

        assert!(matches!(err, AgentError::InvalidConfig(_)));
    }

    #[test]
    fn coerce_arguments_accepts_null_and_objects() {
        assert_eq!(coerce_arguments(&json!(null)).unwrap(), None);
        let map = coerce_arguments(&json!({"q": "rust"})).unwrap().unwrap();
        assert_eq!(map.get("q"), Some(&json!("rust")));
        assert!(coerce_arguments(&json!([1])).is_err());
    }

    #[test]
    fn error_result_maps_to_execution_failure() {
        let result = map_call_result(CallToolResult::error(vec![Content::text("disk full")]));

        let failure = result.as_failure().unwrap();
        assert_eq!(failure.kind, ToolFailureKind::Execution);
        assert_eq!(failure.message, "disk full");
    }

    #[test]
    fn json_text_result_is_parsed() {
        let result = map_call_result(CallToolResult::success(vec![Content::text(
            r#"{"sum": 5}"#,
        )]));

        assert_eq!(result, ToolResult::success(json!({"sum": 5})));
    }

    #[test]
    fn plain_text_result_stays_a_string() {
        let result = map_call_result(CallToolResult::success(vec![Content::text("hello")]));

        assert_eq!(result, ToolResult::success(json!("hello")));
    }

    #[test]
    fn map_service_error_marks_transport_closed() {
        let err = map_service_error("call_tool", ServiceError::TransportClosed);

        assert!(matches!(err, AgentError::Transport(ref m) if m.contains("transport closed")));
    }

    #[tokio::test]
    async fn call_before_open_is_a_transport_failure() {
        let transport = McpTransport::new("unused", Vec::new());

        let result = transport
            .call(&ToolCallRequest::new("c1", "search", json!({})))
            .await;

        assert_eq!(result.as_failure().unwrap().kind, ToolFailureKind::Transport);
        assert!(!transport.is_alive());
    }

    #[tokio::test]
    async fn open_with_missing_binary_fails_and_close_stays_safe() {
        let transport = McpTransport::new("definitely-not-a-real-mcp-server-binary", Vec::new());

        let err = transport.open().await.unwrap_err();

        assert!(matches!(err, AgentError::Transport(_)));
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }
}
