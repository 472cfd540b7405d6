//! Progress events emitted while a request runs.
//!
//! Ephemeral, per-request, serialized with a `type` tag for stream
//! consumers. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Delta {
        text: String,
    },
    ToolStart {
        step: usize,
        #[serde(rename = "toolName")]
        tool_name: String,
        args: Value,
    },
    ToolResult {
        step: usize,
        #[serde(rename = "toolName")]
        tool_name: String,
        ok: bool,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        summary: String,
    },
    Done,
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_carry_a_type_tag() {
        let event = AgentEvent::ToolStart {
            step: 1,
            tool_name: "web_search".into(),
            args: serde_json::json!({ "query": "rust" }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_start");
        assert_eq!(json["toolName"], "web_search");
    }

    #[test]
    fn test_done_round_trip() {
        let json = serde_json::to_string(&AgentEvent::Done).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AgentEvent::Done);
    }
}
