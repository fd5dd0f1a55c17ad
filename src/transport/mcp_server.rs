//! Serve a [`ToolRegistry`] to MCP clients over stdio.

use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};
use tracing::{debug, info};

use crate::error::{AgentError, Result};
use crate::tools::{ToolRegistry, ToolSpec};

/// MCP server handler backed by a shared registry.
///
/// Validation and unknown-tool errors are protocol errors (`invalid_params`);
/// handler failures come back as error results so the caller can read them.
#[derive(Debug, Clone)]
pub struct McpToolServer {
    registry: Arc<ToolRegistry>,
}

impl McpToolServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve on this process's stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<()> {
        let tools = self.registry.len();
        let running = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| AgentError::Transport(format!("MCP initialize failed: {e}")))?;
        info!(tools, "MCP server ready on stdio");

        let reason = running
            .waiting()
            .await
            .map_err(|e| AgentError::Transport(format!("MCP server task failed: {e}")))?;
        info!(?reason, "MCP server stopped");
        Ok(())
    }

    async fn invoke(&self, request: CallToolRequestParams) -> std::result::Result<CallToolResult, McpError> {
        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Null);
        debug!(tool = %request.name, "MCP tool call");

        match self.registry.invoke(&request.name, arguments).await {
            Ok(payload) => Ok(CallToolResult::success(vec![Content::text(payload.to_string())])),
            Err(AgentError::ToolExecution { message, .. }) => {
                Ok(CallToolResult::error(vec![Content::text(message)]))
            }
            Err(error @ (AgentError::UnknownTool(_) | AgentError::Validation { .. })) => {
                Err(McpError::invalid_params(error.to_string(), None))
            }
            Err(other) => Err(McpError::internal_error(other.to_string(), None)),
        }
    }
}

fn to_mcp_tool(spec: ToolSpec) -> Tool {
    let schema = match spec.input_schema {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Tool::new(spec.name, spec.description, Arc::new(schema))
}

impl ServerHandler for McpToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Demo tools served by toolloop.".into()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let tools = self
            .registry
            .list_definitions()
            .into_iter()
            .map(to_mcp_tool)
            .collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn server() -> McpToolServer {
        let registry = Arc::new(ToolRegistry::new());
        builtin::register_all(&registry).unwrap();
        McpToolServer::new(registry)
    }

    fn params(name: &str, arguments: serde_json::Value) -> CallToolRequestParams {
        CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        }
    }

    #[test]
    fn tool_schema_is_carried_over() {
        let tool = to_mcp_tool(ToolSpec {
            name: "sum".into(),
            description: "Add".into(),
            input_schema: json!({"type": "object", "properties": {"a": {"type": "integer"}}}),
        });

        assert_eq!(tool.name, "sum");
        assert_eq!(tool.input_schema["properties"]["a"]["type"], "integer");
    }

    #[tokio::test]
    async fn successful_call_returns_json_text() {
        let result = server()
            .invoke(params("web_search", json!({"query": "rust"})))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(false));
        let text = &result.content[0].as_text().unwrap().text;
        let payload: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["query"], "rust");
    }

    #[tokio::test]
    async fn invalid_arguments_are_invalid_params() {
        let err = server()
            .invoke(params("web_search", json!({"query": 3})))
            .await
            .unwrap_err();

        assert!(err.message.contains("query"));
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let err = server().invoke(params("nope", json!({}))).await.unwrap_err();

        assert!(err.message.contains("nope"));
    }
}
