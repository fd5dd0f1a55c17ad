//! Tool transports: the session boundary between the orchestrator and tools.

pub mod local;
#[cfg(feature = "mcp")]
pub mod mcp;
#[cfg(feature = "mcp")]
pub mod mcp_server;

pub use local::LocalTransport;
#[cfg(feature = "mcp")]
pub use mcp::McpTransport;
#[cfg(feature = "mcp")]
pub use mcp_server::McpToolServer;

use async_trait::async_trait;

use crate::error::Result;
use crate::tools::ToolSpec;
use crate::types::{ToolCallRequest, ToolResult};

/// Lifecycle of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Open,
    Closed,
}

/// Lists tools and dispatches calls, in-process or remote.
///
/// `call` never fails: every problem below this boundary comes back as a
/// [`ToolResult::Failure`]. `close` is idempotent and safe to call at any point.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Establish the underlying connection. A no-op while already open.
    async fn open(&self) -> Result<()>;

    /// Current tool projections.
    async fn discover(&self) -> Result<Vec<ToolSpec>>;

    /// Dispatch one call.
    async fn call(&self, request: &ToolCallRequest) -> ToolResult;

    /// Release the connection.
    async fn close(&self) -> Result<()>;

    /// False once the connection is closed or has been lost for good.
    fn is_alive(&self) -> bool {
        true
    }

    /// Whether calls may be multiplexed over this transport.
    fn supports_concurrent_calls(&self) -> bool {
        true
    }
}
