//! Parsing the model's reply into an action.
//!
//! The contract is strict JSON: `{"type":"final","answer":...}` or
//! `{"type":"tool_call","toolName":...,"arguments":{...}}`, optionally
//! wrapped in a markdown code fence. Anything else (prose, malformed JSON,
//! an unknown tool name) means the raw text is the final answer. That
//! fallback is deliberate: a model that ignores the contract still produces
//! a usable reply instead of an error.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    Final {
        answer: String,
    },
    ToolCall {
        tool_name: String,
        arguments: Map<String, Value>,
        rationale: Option<String>,
    },
}

/// Strip one surrounding markdown code fence, with or without a language
/// tag. Text without a fence passes through untouched.
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the language tag on the opening line
    match body.split_once('\n') {
        Some((first_line, tail)) if !first_line.trim().contains(' ') => tail.trim(),
        _ => body.trim(),
    }
}

/// Try to read the text as an action. `allowed_tools` is the agent-callable
/// allowlist; a tool_call naming anything else is not a recognized action.
pub fn parse_action(text: &str, allowed_tools: &[&str]) -> Option<AgentAction> {
    let candidate = strip_markdown_fence(text);
    let value: Value = serde_json::from_str(candidate).ok()?;
    let obj = value.as_object()?;

    match obj.get("type")?.as_str()? {
        "final" => {
            let answer = obj.get("answer")?.as_str()?.to_string();
            Some(AgentAction::Final { answer })
        }
        "tool_call" => {
            let tool_name = obj.get("toolName")?.as_str()?.to_string();
            if !allowed_tools.iter().any(|t| *t == tool_name) {
                return None;
            }
            let arguments = obj.get("arguments")?.as_object()?.clone();
            let rationale = obj
                .get("rationale")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(AgentAction::ToolCall {
                tool_name,
                arguments,
                rationale,
            })
        }
        _ => None,
    }
}
