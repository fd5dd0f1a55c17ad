//! Append-only conversation history.

use std::collections::HashSet;

use crate::error::{AgentError, Result};
use crate::types::{Message, Role};

/// Ordered message history with tool-call/result pairing enforced on append.
///
/// Every tool-role message must answer a tool call requested earlier in the
/// same history, and each request is answered at most once.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    requested: HashSet<String>,
    answered: HashSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, rejecting orphan or duplicate tool results and reused call ids.
    pub fn push(&mut self, message: Message) -> Result<()> {
        match message.role {
            Role::Tool => {
                let id = message.tool_call_id.as_deref().ok_or_else(|| {
                    AgentError::ModelProtocol("tool result without a tool call id".into())
                })?;
                let carried = message
                    .tool_result_content()
                    .map(|content| content.tool_call_id.as_str());
                if carried != Some(id) {
                    return Err(AgentError::ModelProtocol(format!(
                        "tool message '{id}' does not carry a matching result"
                    )));
                }
                if !self.requested.contains(id) {
                    return Err(AgentError::ModelProtocol(format!(
                        "tool result '{id}' has no matching request"
                    )));
                }
                if self.answered.contains(id) {
                    return Err(AgentError::ModelProtocol(format!(
                        "tool call '{id}' already has a result"
                    )));
                }
                self.answered.insert(id.to_string());
            }
            Role::Assistant => {
                let mut ids = HashSet::new();
                for call in message.tool_calls() {
                    if call.id.is_empty() {
                        return Err(AgentError::ModelProtocol(format!(
                            "tool call for '{}' has an empty id",
                            call.name
                        )));
                    }
                    if self.requested.contains(&call.id) || !ids.insert(call.id.clone()) {
                        return Err(AgentError::ModelProtocol(format!(
                            "tool call id '{}' is not unique",
                            call.id
                        )));
                    }
                }
                self.requested.extend(ids);
            }
            Role::User => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the history.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether `id` was already used by a tool call in this history.
    pub fn has_request(&self, id: &str) -> bool {
        self.requested.contains(id)
    }

    /// Requested tool calls that have no result yet, in request order.
    pub fn pending_tool_calls(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(Message::tool_calls)
            .filter(|call| !self.answered.contains(&call.id))
            .map(|call| call.id.clone())
            .collect()
    }

    /// Drop all history and start over.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.requested.clear();
        self.answered.clear();
    }
}
