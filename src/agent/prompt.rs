//! The static system prompt.
//!
//! Built once per request from the agent-callable slice of the capability
//! table: every tool with its description and argument names, the JSON
//! action contract, and the decision heuristics.

use serde_json::Value;

use crate::gateway::types::ToolDescriptor;

fn argument_summary(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return "(no arguments)".to_string();
    };
    if properties.is_empty() {
        return "(no arguments)".to_string();
    }
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| {
            let kind = prop.get("type").and_then(Value::as_str).unwrap_or("any");
            if required.contains(&name.as_str()) {
                format!("{name}: {kind}")
            } else {
                format!("{name}?: {kind}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_system_prompt(agent_tools: &[ToolDescriptor]) -> String {
    let mut tool_lines = String::new();
    for tool in agent_tools {
        tool_lines.push_str(&format!(
            "- {}: {} Arguments: {{ {} }}\n",
            tool.name,
            tool.description,
            argument_summary(&tool.input_schema)
        ));
    }

    format!(
        r#"You are a helpful assistant that can call tools when a question needs external information or local file access.

Available tools:
{tool_lines}
To act, reply with EXACTLY ONE JSON object and nothing else:
- To call a tool: {{"type":"tool_call","toolName":"<name>","arguments":{{...}},"rationale":"<one short sentence>"}}
- To answer the user: {{"type":"final","answer":"<your answer>"}}

Rules:
- Use web_search when the question needs current facts you cannot know.
- Use get_weather for weather questions; pass the location as the query.
- Use the file tools only when the user refers to their local files; paths may be absolute or relative to the allowed roots.
- Never invent tool names or arguments not listed above.
- Prefer answering directly when no tool is needed.
- After a tool result you will be asked to decide again: finish with "final" or make the next tool_call."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::registry;

    fn agent_descriptors() -> Vec<ToolDescriptor> {
        registry::descriptors()
            .into_iter()
            .filter(|d| registry::AGENT_TOOL_NAMES.contains(&d.name.as_str()))
            .collect()
    }

    #[test]
    fn test_prompt_lists_every_agent_tool() {
        let prompt = build_system_prompt(&agent_descriptors());
        for name in registry::AGENT_TOOL_NAMES {
            assert!(prompt.contains(name), "prompt is missing {name}");
        }
    }

    #[test]
    fn test_prompt_excludes_registry_only_tools() {
        let prompt = build_system_prompt(&agent_descriptors());
        assert!(!prompt.contains("save_chat_answer"));
        assert!(!prompt.contains("- ping"));
    }

    #[test]
    fn test_argument_summary_marks_optional() {
        let table = registry::descriptors();
        let d = registry::find_descriptor(&table, "web_search").unwrap();
        let summary = argument_summary(&d.input_schema);
        assert!(summary.contains("query: string"));
        assert!(summary.contains("max_results?: integer"));
    }
}
