//! Terminal output for turn progress and tool listings.

use std::sync::Arc;

use crate::agent::{TurnEvent, TurnEventPayload, TurnEventSink, TurnOutcome};
use crate::tools::ToolSpec;

const PREVIEW_CHARS: usize = 200;

/// Event sink printing tool activity to stderr.
pub fn progress_sink() -> TurnEventSink {
    Arc::new(|event: TurnEvent| match &event.payload {
        TurnEventPayload::ToolCallStarted { call } => {
            eprintln!("  -> {} ({})", call.name, call.id);
        }
        TurnEventPayload::ToolCallFinished { result, .. } => {
            let preview = truncate(&result.to_model_value().to_string(), PREVIEW_CHARS);
            if result.is_error() {
                eprintln!("  x  {preview}");
            } else {
                eprintln!("  ok {preview}");
            }
        }
        TurnEventPayload::ModelCallStarted { attempt, .. } if *attempt > 1 => {
            eprintln!("  .. retrying model call (attempt {attempt})");
        }
        TurnEventPayload::TurnFinished {
            outcome: TurnOutcome::Cancelled,
        } => {
            eprintln!("  turn cancelled");
        }
        _ => {}
    })
}

/// Bullet list of tool names and descriptions.
pub fn tool_list(tools: &[ToolSpec]) -> String {
    let mut out = format!("Available tools ({}):", tools.len());
    for tool in tools {
        out.push_str(&format!("\n  - {}: {}", tool.name, tool.description));
    }
    out
}

/// Cut `text` to at most `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn tool_list_counts_tools() {
        let tools = vec![ToolSpec {
            name: "sum".into(),
            description: "Add two integers".into(),
            input_schema: json!({ "type": "object" }),
        }];

        let rendered = tool_list(&tools);

        assert!(rendered.starts_with("Available tools (1):"));
        assert!(rendered.contains("- sum: Add two integers"));
    }
}
