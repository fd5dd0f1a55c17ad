//! The turn loop: drives one user submission to a final answer or a failure.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::conversation::Conversation;
use super::events::{TurnEmitter, TurnEventPayload, TurnEventSink, TurnOutcome};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::model::{GenerationSettings, ModelClient, ModelRequest, ModelResponse};
use crate::tools::ToolSpec;
use crate::transport::ToolTransport;
use crate::types::{Message, ToolCallRequest, ToolFailureKind, ToolResult};
use crate::util::{with_timeout, RetryPolicy};

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed,
}

/// Final answer of a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantAnswer {
    pub text: String,
    /// Tool cycles the turn needed.
    pub round_trips: u32,
    /// Tool calls executed during the turn.
    pub tool_calls: usize,
}

/// A turn that ended without a final answer. The session stays usable.
#[derive(Debug, Error)]
#[error("turn failed while {state} after {round_trips} round trip(s): {error}")]
pub struct TurnFailure {
    #[source]
    pub error: AgentError,
    /// State the turn was in when it failed.
    pub state: TurnState,
    pub round_trips: u32,
}

impl TurnFailure {
    pub fn new(error: AgentError, state: TurnState, round_trips: u32) -> Self {
        Self {
            error,
            state,
            round_trips,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, AgentError::Cancelled)
    }
}

/// Runs turns against one model client and one transport.
pub struct TurnOrchestrator {
    model: Arc<dyn ModelClient>,
    transport: Arc<dyn ToolTransport>,
    settings: GenerationSettings,
    retry: RetryPolicy,
    call_timeout: Duration,
    max_round_trips: u32,
    events: Option<TurnEventSink>,
    turns: AtomicU64,
}

impl TurnOrchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        transport: Arc<dyn ToolTransport>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            model,
            transport,
            settings: GenerationSettings::from(config),
            retry: RetryPolicy::from(config),
            call_timeout: config.call_timeout(),
            max_round_trips: config.max_tool_round_trips,
            events: None,
            turns: AtomicU64::new(0),
        }
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn set_event_sink(&mut self, sink: Option<TurnEventSink>) {
        self.events = sink;
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Run one turn: append `input`, then alternate model calls and tool
    /// execution until the model answers or the turn fails.
    ///
    /// Everything appended before a failure stays in `conversation`.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        tools: &[ToolSpec],
        input: String,
        cancel: &CancellationToken,
    ) -> std::result::Result<AssistantAnswer, TurnFailure> {
        let turn = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        let emitter = TurnEmitter::new(turn, self.events.as_ref());
        info!(turn, "turn started");
        emitter.emit(TurnEventPayload::TurnStarted {
            input: input.clone(),
        });

        let result = self
            .drive(turn, &emitter, conversation, tools, input, cancel)
            .await;

        let outcome = match &result {
            Ok(answer) => {
                info!(turn, round_trips = answer.round_trips, "turn completed");
                TurnOutcome::Done {
                    round_trips: answer.round_trips,
                }
            }
            Err(failure) if failure.is_cancelled() => {
                info!(turn, state = %failure.state, "turn cancelled");
                TurnOutcome::Cancelled
            }
            Err(failure) => {
                warn!(turn, state = %failure.state, error = %failure.error, "turn failed");
                TurnOutcome::Failed {
                    state: failure.state,
                    error: failure.error.to_string(),
                }
            }
        };
        emitter.emit(TurnEventPayload::TurnFinished { outcome });
        result
    }

    async fn drive(
        &self,
        turn: u64,
        emitter: &TurnEmitter<'_>,
        conversation: &mut Conversation,
        tools: &[ToolSpec],
        input: String,
        cancel: &CancellationToken,
    ) -> std::result::Result<AssistantAnswer, TurnFailure> {
        let mut round_trips = 0u32;
        let mut executed = 0usize;

        conversation
            .push(Message::user(input))
            .map_err(|e| TurnFailure::new(e, TurnState::AwaitingModel, round_trips))?;

        loop {
            debug!(turn, round_trip = round_trips, state = %TurnState::AwaitingModel, "calling model");
            let response = self
                .call_model(conversation, tools, round_trips, emitter, cancel)
                .await
                .map_err(|e| TurnFailure::new(e, TurnState::AwaitingModel, round_trips))?;

            let (text, calls) = match response {
                ModelResponse::FinalAnswer(text) => {
                    conversation
                        .push(Message::assistant(text.clone()))
                        .map_err(|e| TurnFailure::new(e, TurnState::AwaitingModel, round_trips))?;
                    return Ok(AssistantAnswer {
                        text,
                        round_trips,
                        tool_calls: executed,
                    });
                }
                ModelResponse::ToolCallsRequested { text, calls } => (text, calls),
            };

            if round_trips >= self.max_round_trips {
                return Err(TurnFailure::new(
                    AgentError::TurnLimitExceeded {
                        limit: self.max_round_trips,
                    },
                    TurnState::AwaitingModel,
                    round_trips,
                ));
            }
            validate_tool_calls(&calls, conversation)
                .and_then(|()| conversation.push(Message::assistant_tool_calls(text, calls.clone())))
                .map_err(|e| TurnFailure::new(e, TurnState::AwaitingModel, round_trips))?;
            round_trips += 1;

            debug!(turn, round_trip = round_trips, calls = calls.len(), state = %TurnState::ExecutingTools, "executing tools");
            let results = self.execute_tools(&calls, emitter, cancel).await;
            executed += calls.len();
            for (call, result) in calls.iter().zip(results) {
                conversation
                    .push(Message::tool_result(call.id.clone(), result))
                    .map_err(|e| TurnFailure::new(e, TurnState::ExecutingTools, round_trips))?;
            }

            if cancel.is_cancelled() {
                return Err(TurnFailure::new(
                    AgentError::Cancelled,
                    TurnState::ExecutingTools,
                    round_trips,
                ));
            }
            if !self.transport.is_alive() {
                return Err(TurnFailure::new(
                    AgentError::Transport(format!(
                        "{} transport lost its connection",
                        self.transport.name()
                    )),
                    TurnState::ExecutingTools,
                    round_trips,
                ));
            }
        }
    }

    async fn call_model(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
        round_trip: u32,
        emitter: &TurnEmitter<'_>,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let request = ModelRequest {
            messages: conversation.snapshot(),
            tools: tools.to_vec(),
            settings: self.settings.clone(),
        };
        let request = &request;
        let model = &self.model;
        let call_timeout = self.call_timeout;

        self.retry
            .execute(cancel, move |attempt| {
                debug!(round_trip, attempt, provider = model.provider_name(), "model call");
                emitter.emit(TurnEventPayload::ModelCallStarted {
                    round_trip,
                    attempt,
                });
                async move {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(AgentError::Cancelled),
                        response = with_timeout(call_timeout, model.send(request)) => response,
                    }
                }
            })
            .await
    }

    /// Run every call and return results in request order.
    async fn execute_tools(
        &self,
        calls: &[ToolCallRequest],
        emitter: &TurnEmitter<'_>,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        if self.transport.supports_concurrent_calls() {
            let futures = calls
                .iter()
                .map(|call| self.dispatch(call, emitter, cancel));
            return future::join_all(futures).await;
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                let result = cancelled_tool_result();
                emit_tool_finished(emitter, call, &result);
                results.push(result);
                continue;
            }
            results.push(self.dispatch(call, emitter, cancel).await);
        }
        results
    }

    async fn dispatch(
        &self,
        call: &ToolCallRequest,
        emitter: &TurnEmitter<'_>,
        cancel: &CancellationToken,
    ) -> ToolResult {
        emitter.emit(TurnEventPayload::ToolCallStarted { call: call.clone() });
        debug!(tool = %call.name, call_id = %call.id, transport = self.transport.name(), "tool call");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => cancelled_tool_result(),
            outcome = tokio::time::timeout(self.call_timeout, self.transport.call(call)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => ToolResult::failure(
                        ToolFailureKind::Timeout,
                        format!(
                            "tool '{}' timed out after {}ms",
                            call.name,
                            self.call_timeout.as_millis()
                        ),
                    ),
                }
            }
        };

        if let Some(failure) = result.as_failure() {
            debug!(tool = %call.name, call_id = %call.id, kind = %failure.kind, "tool call failed");
        }
        emit_tool_finished(emitter, call, &result);
        result
    }
}

fn cancelled_tool_result() -> ToolResult {
    ToolResult::failure(ToolFailureKind::Cancelled, "tool call cancelled")
}

fn emit_tool_finished(emitter: &TurnEmitter<'_>, call: &ToolCallRequest, result: &ToolResult) {
    emitter.emit(TurnEventPayload::ToolCallFinished {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        result: result.clone(),
    });
}

/// Check a model's tool-call list before it enters history.
fn validate_tool_calls(calls: &[ToolCallRequest], conversation: &Conversation) -> Result<()> {
    if calls.is_empty() {
        return Err(AgentError::ModelProtocol(
            "model requested tools without any tool calls".into(),
        ));
    }
    let mut seen = HashSet::new();
    for call in calls {
        if call.id.trim().is_empty() {
            return Err(AgentError::ModelProtocol(format!(
                "tool call for '{}' has an empty id",
                call.name
            )));
        }
        if !seen.insert(call.id.as_str()) {
            return Err(AgentError::ModelProtocol(format!(
                "duplicate tool call id '{}' in one response",
                call.id
            )));
        }
        if conversation.has_request(&call.id) {
            return Err(AgentError::ModelProtocol(format!(
                "tool call id '{}' was already used in this session",
                call.id
            )));
        }
        if !(call.arguments.is_object() || call.arguments.is_null()) {
            return Err(AgentError::ModelProtocol(format!(
                "arguments for tool call '{}' must be a JSON object",
                call.id
            )));
        }
    }
    Ok(())
}
