//! Conversation history, the turn loop and the session that owns them.

pub mod conversation;
pub mod events;
pub mod orchestrator;
pub mod session;

pub use conversation::Conversation;
pub use events::{TurnEvent, TurnEventPayload, TurnEventSink, TurnOutcome};
pub use orchestrator::{AssistantAnswer, TurnFailure, TurnOrchestrator, TurnState};
pub use session::{CancelHandle, Session, SessionState};
