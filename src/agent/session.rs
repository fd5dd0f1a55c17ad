//! Long-lived conversation context owning history, a transport and its lifecycle.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::conversation::Conversation;
use super::events::TurnEventSink;
use super::orchestrator::{AssistantAnswer, TurnFailure, TurnOrchestrator, TurnState};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::model::ModelClient;
use crate::tools::ToolSpec;
use crate::transport::ToolTransport;
use crate::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Open,
    Closed,
}

/// Cancels whichever turn is currently running on a session.
///
/// Cloneable and usable from another task while `submit` is awaited.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Abort the running turn, if any.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_cancelled()
    }

    fn arm(&self, token: CancellationToken) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = token;
    }
}

/// One conversation bound to one tool transport.
pub struct Session {
    id: Uuid,
    config: AgentConfig,
    transport: Arc<dyn ToolTransport>,
    model: Arc<dyn ModelClient>,
    orchestrator: TurnOrchestrator,
    conversation: Conversation,
    tools: Vec<ToolSpec>,
    state: SessionState,
    cancel: CancelHandle,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("transport", &self.transport.name())
            .field("model", &self.model.provider_name())
            .field("messages", &self.conversation.len())
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl Session {
    /// Validate `config`, open `transport` and discover its tools.
    ///
    /// The transport is closed again if discovery fails.
    pub async fn start(
        config: AgentConfig,
        transport: Arc<dyn ToolTransport>,
        model: Arc<dyn ModelClient>,
    ) -> Result<Self> {
        config.validate()?;
        transport.open().await?;

        let tools = match transport.discover().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!(error = %close_err, "failed to close transport after discovery error");
                }
                return Err(e);
            }
        };

        let id = Uuid::new_v4();
        info!(
            session = %id,
            transport = transport.name(),
            model = %config.model,
            tools = tools.len(),
            "session started"
        );

        let orchestrator = TurnOrchestrator::new(model.clone(), transport.clone(), &config);
        Ok(Self {
            id,
            config,
            transport,
            model,
            orchestrator,
            conversation: Conversation::new(),
            tools,
            state: SessionState::Open,
            cancel: CancelHandle::new(),
        })
    }

    /// Start a session, run `f` with it and close it whatever `f` returns.
    pub async fn scoped<T, F>(
        config: AgentConfig,
        transport: Arc<dyn ToolTransport>,
        model: Arc<dyn ModelClient>,
        f: F,
    ) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, T>,
    {
        let mut session = Self::start(config, transport, model).await?;
        let value = f(&mut session).await;
        session.close().await?;
        Ok(value)
    }

    /// Run one turn for `text`.
    pub async fn submit(
        &mut self,
        text: impl Into<String>,
    ) -> std::result::Result<AssistantAnswer, TurnFailure> {
        self.submit_with_cancel(text, CancellationToken::new()).await
    }

    /// Run one turn that also aborts when `token` is cancelled.
    pub async fn submit_with_cancel(
        &mut self,
        text: impl Into<String>,
        token: CancellationToken,
    ) -> std::result::Result<AssistantAnswer, TurnFailure> {
        if self.state == SessionState::Closed {
            return Err(TurnFailure::new(
                AgentError::SessionClosed,
                TurnState::Failed,
                0,
            ));
        }
        let turn_token = token.child_token();
        self.cancel.arm(turn_token.clone());

        let result = self
            .orchestrator
            .run_turn(&mut self.conversation, &self.tools, text.into(), &turn_token)
            .await;

        if !self.transport.is_alive() {
            warn!(session = %self.id, transport = self.transport.name(), "transport lost; closing session");
            if let Err(e) = self.close().await {
                warn!(session = %self.id, error = %e, "failed to close transport after it was lost");
            }
        }
        result
    }

    /// Snapshot of the conversation so far.
    pub fn history(&self) -> Vec<Message> {
        self.conversation.snapshot()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Tool projections discovered at start or at the last refresh.
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    /// Re-discover tools from the transport.
    pub async fn refresh_tools(&mut self) -> Result<&[ToolSpec]> {
        if self.state == SessionState::Closed {
            return Err(AgentError::SessionClosed);
        }
        self.tools = self.transport.discover().await?;
        debug!(session = %self.id, tools = self.tools.len(), "tools refreshed");
        Ok(&self.tools)
    }

    pub fn clear_history(&mut self) {
        self.conversation.clear();
        debug!(session = %self.id, "history cleared");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.orchestrator.set_event_sink(Some(sink));
        self
    }

    pub fn set_event_sink(&mut self, sink: Option<TurnEventSink>) {
        self.orchestrator.set_event_sink(sink);
    }

    /// Cancel any running turn and close the transport. Safe to call twice.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.cancel.cancel();
        let result = self.transport.close().await;
        info!(session = %self.id, "session closed");
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.cancel.cancel();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(session = %self.id, "session dropped outside a runtime; transport left open");
            return;
        };
        let transport = self.transport.clone();
        let id = self.id;
        handle.spawn(async move {
            if let Err(e) = transport.close().await {
                warn!(session = %id, error = %e, "close on drop failed");
            }
        });
    }
}
