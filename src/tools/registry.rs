//! Tool registry: registration, discovery and validated invocation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{OnceLock, RwLock};

use futures::FutureExt;
use regex::Regex;
use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::definition::{ToolDefinition, ToolSpec};
use crate::error::{AgentError, Result};

fn tool_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap_or_else(|e| panic!("invalid pattern: {e}"))
    })
}

#[derive(Default)]
struct Inner {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

/// Registered tools, in registration order.
///
/// Registration takes `&self` so a registry shared behind an `Arc` can keep
/// growing; discovery always reflects the current set.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool definition.
    pub fn register(&self, definition: ToolDefinition) -> Result<()> {
        let name = definition.name().to_string();
        if !tool_name_pattern().is_match(&name) {
            return Err(AgentError::InvalidToolDefinition {
                name,
                message: "name must be 1-64 characters of letters, digits, '_' or '-'".into(),
            });
        }
        definition
            .schema()
            .check()
            .map_err(|message| AgentError::InvalidToolDefinition {
                name: name.clone(),
                message,
            })?;

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.index.contains_key(&name) {
            return Err(AgentError::DuplicateToolName(name));
        }
        let position = inner.tools.len();
        inner.tools.push(definition);
        inner.index.insert(name.clone(), position);
        debug!(tool = %name, "registered tool");
        Ok(())
    }

    /// Projections of every registered tool, in registration order.
    pub fn list_definitions(&self) -> Vec<ToolSpec> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.tools.iter().map(ToolDefinition::spec).collect()
    }

    pub fn get(&self, name: &str) -> Option<ToolDefinition> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.index.get(name).map(|&idx| inner.tools[idx].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate `args` against the tool's schema and run its handler.
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let definition = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        let normalized = definition
            .schema()
            .validate(&args)
            .map_err(|message| AgentError::validation(name, message))?;

        debug!(tool = name, "invoking tool");
        // The handler itself runs inside the guard so a panic before its
        // future is built is caught too.
        let args = ToolArguments::for_tool(name, normalized);
        let outcome = AssertUnwindSafe(async { definition.call(args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(AgentError::ToolExecution { message, .. })) => {
                Err(AgentError::tool_execution(name, message))
            }
            Ok(Err(other)) => Err(AgentError::tool_execution(name, other.to_string())),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = name, %message, "tool handler panicked");
                Err(AgentError::tool_execution(name, message))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &inner.tools.iter().map(ToolDefinition::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
