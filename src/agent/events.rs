//! Turn progress events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::orchestrator::TurnState;
use crate::types::{ToolCallRequest, ToolResult};

/// Callback used for streaming turn events.
pub type TurnEventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Done { round_trips: u32 },
    Failed { state: TurnState, error: String },
    Cancelled,
}

/// Concrete event payloads emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEventPayload {
    TurnStarted { input: String },
    ModelCallStarted { round_trip: u32, attempt: u32 },
    ToolCallStarted { call: ToolCallRequest },
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        result: ToolResult,
    },
    TurnFinished { outcome: TurnOutcome },
}

/// Envelope for turn events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    /// 1-based turn number within the session.
    pub turn: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: TurnEventPayload,
}

pub(crate) struct TurnEmitter<'a> {
    turn: u64,
    sink: Option<&'a TurnEventSink>,
}

impl<'a> TurnEmitter<'a> {
    pub(crate) fn new(turn: u64, sink: Option<&'a TurnEventSink>) -> Self {
        Self { turn, sink }
    }

    pub(crate) fn emit(&self, payload: TurnEventPayload) {
        let Some(sink) = self.sink else {
            return;
        };
        (sink)(TurnEvent {
            turn: self.turn,
            timestamp: Utc::now(),
            payload,
        });
    }
}
