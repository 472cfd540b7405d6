//! The bounded decision loop.
//!
//! One request runs a strictly sequential cycle: invoke the model, parse
//! its reply into an action, dispatch at most one tool call, feed the
//! result back, repeat up to the step budget. Both seams are traits so the
//! loop is testable without a network or a worker process.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RuntimeConfig;
use crate::gateway::types::ToolDescriptor;
use crate::gateway::{registry, GatewayClient, GatewayError};
use crate::inference::{ChatMessage, InferenceClient, InferenceError};
use crate::tools::ToolOutcome;

use super::action::{parse_action, AgentAction};
use super::errors::AgentError;
use super::events::AgentEvent;
use super::prompt::build_system_prompt;

const SUMMARY_CHARS: usize = 180;
const RESULT_DATA_CHARS: usize = 4_000;
const DELTA_CHUNK_CHARS: usize = 48;
const MAX_SOURCES: usize = 8;

// ─── Conversation input ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: TurnRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }

    fn to_message(&self) -> ChatMessage {
        match self.role {
            TurnRole::User => ChatMessage::user(self.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

// ─── Seams ───────────────────────────────────────────────────────────────────

pub trait ModelEndpoint: Sync {
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> impl std::future::Future<Output = Result<String, InferenceError>> + Send;
}

pub trait ToolDispatcher: Sync {
    fn dispatch(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> impl std::future::Future<Output = Result<ToolOutcome, GatewayError>> + Send;
}

impl ModelEndpoint for InferenceClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
        InferenceClient::complete(self, messages).await
    }
}

impl<M: ModelEndpoint> ModelEndpoint for &M {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
        (*self).complete(messages).await
    }
}

impl ToolDispatcher for GatewayClient {
    async fn dispatch(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutcome, GatewayError> {
        self.call_tool(name, arguments).await
    }
}

impl<T: ToolDispatcher> ToolDispatcher for &T {
    async fn dispatch(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutcome, GatewayError> {
        (*self).dispatch(name, arguments).await
    }
}

// ─── Source citations ────────────────────────────────────────────────────────

/// Collects `sources` entries and provider names from tool payloads; they
/// are appended to the final answer as a citation block.
#[derive(Debug, Default)]
struct SourceCollector {
    sources: Vec<(String, String)>,
    providers: Vec<String>,
}

impl SourceCollector {
    fn collect(&mut self, data: &Value) {
        if let Some(provider) = data["provider"].as_str() {
            if !self.providers.iter().any(|p| p == provider) {
                self.providers.push(provider.to_string());
            }
        }
        let Some(entries) = data["sources"].as_array() else {
            return;
        };
        for entry in entries {
            let Some(url) = entry["url"].as_str() else { continue };
            if self.sources.iter().any(|(_, u)| u == url) {
                continue;
            }
            let title = entry["title"].as_str().unwrap_or(url);
            self.sources.push((title.to_string(), url.to_string()));
        }
    }

    fn append_to(&self, answer: &str) -> String {
        if self.sources.is_empty() {
            return answer.to_string();
        }
        let mut out = String::from(answer);
        out.push_str("\n\nSources:\n");
        for (title, url) in self.sources.iter().take(MAX_SOURCES) {
            out.push_str(&format!("- {title} - {url}\n"));
        }
        if !self.providers.is_empty() {
            out.push_str(&format!("(via {})", self.providers.join(", ")));
        }
        out
    }
}

fn slice_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

// ─── Loop ────────────────────────────────────────────────────────────────────

pub struct AgentLoop<M, T> {
    model: M,
    tools: T,
    max_steps: usize,
    descriptors: Vec<ToolDescriptor>,
}

impl<M: ModelEndpoint, T: ToolDispatcher> AgentLoop<M, T> {
    pub fn new(model: M, tools: T, max_steps: usize, agent_descriptors: Vec<ToolDescriptor>) -> Self {
        Self {
            model,
            tools,
            max_steps,
            descriptors: agent_descriptors,
        }
    }

    /// Run one request to completion, emitting progress events along the
    /// way. Tool failures are fed back to the model; only a model-endpoint
    /// failure is terminal.
    pub async fn run(
        &self,
        turns: &[ChatTurn],
        emit: &mut (dyn FnMut(AgentEvent) + Send),
    ) -> Result<String, AgentError> {
        let allowed: Vec<&str> = self.descriptors.iter().map(|d| d.name.as_str()).collect();
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage::system(build_system_prompt(&self.descriptors)));
        messages.extend(turns.iter().map(ChatTurn::to_message));

        let mut collector = SourceCollector::default();

        for step in 0..self.max_steps {
            let reply = self.model.complete(messages.clone()).await?;

            let Some(action) = parse_action(&reply, &allowed) else {
                // the contract was ignored; the text itself is the answer
                tracing::debug!(step, "unparseable action, treating reply as final");
                return Ok(collector.append_to(reply.trim()));
            };

            let (tool_name, arguments) = match action {
                AgentAction::Final { answer } => return Ok(collector.append_to(&answer)),
                AgentAction::ToolCall { tool_name, arguments, rationale } => {
                    if let Some(rationale) = &rationale {
                        tracing::debug!(step, tool = %tool_name, rationale, "tool call requested");
                    }
                    (tool_name, arguments)
                }
            };

            emit(AgentEvent::ToolStart {
                step: step + 1,
                tool_name: tool_name.clone(),
                args: Value::Object(arguments.clone()),
            });

            let started = Instant::now();
            let result = self.tools.dispatch(&tool_name, &arguments).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            messages.push(ChatMessage::assistant(reply));
            match result {
                Ok(outcome) => {
                    collector.collect(&outcome.data);
                    emit(AgentEvent::ToolResult {
                        step: step + 1,
                        tool_name: tool_name.clone(),
                        ok: true,
                        duration_ms,
                        summary: slice_chars(&outcome.text, SUMMARY_CHARS),
                    });
                    let data = slice_chars(
                        &serde_json::to_string(&outcome.data).unwrap_or_default(),
                        RESULT_DATA_CHARS,
                    );
                    messages.push(ChatMessage::user(format!(
                        "Tool result from {tool_name}: {}\nData: {data}\n\nDecide: reply with a final answer or the next tool_call.",
                        outcome.text
                    )));
                }
                Err(e) => {
                    tracing::warn!(tool = %tool_name, error = %e, "tool call failed");
                    emit(AgentEvent::ToolResult {
                        step: step + 1,
                        tool_name: tool_name.clone(),
                        ok: false,
                        duration_ms,
                        summary: slice_chars(&e.to_string(), SUMMARY_CHARS),
                    });
                    messages.push(ChatMessage::user(format!(
                        "The {tool_name} call failed: {e}. Adjust the arguments and retry, or reply with a final answer."
                    )));
                }
            }
        }

        // budget exhausted: force an immediate final
        messages.push(ChatMessage::user(
            "You have used all available tool steps. Reply now with {\"type\":\"final\",\"answer\":\"...\"} and nothing else.".to_string(),
        ));
        let reply = self.model.complete(messages).await?;
        match parse_action(&reply, &allowed) {
            Some(AgentAction::Final { answer }) => Ok(collector.append_to(&answer)),
            _ => Ok(collector.append_to(reply.trim())),
        }
    }
}

/// Agent-callable slice of the capability table.
pub fn agent_descriptors() -> Vec<ToolDescriptor> {
    registry::descriptors()
        .into_iter()
        .filter(|d| registry::AGENT_TOOL_NAMES.contains(&d.name.as_str()))
        .collect()
}

/// Run one chat request end to end, streaming the answer as delta events.
///
/// When the loop cannot produce an answer the request degrades to a plain
/// streaming completion; the stream always terminates with `Done` or one
/// `Error`.
pub async fn stream_chat(
    config: &RuntimeConfig,
    turns: &[ChatTurn],
    emit: &mut (dyn FnMut(AgentEvent) + Send),
) {
    let client = match InferenceClient::from_config(config) {
        Ok(c) => c,
        Err(e) => {
            emit(AgentEvent::Error { message: e.to_string() });
            return;
        }
    };
    let gateway = GatewayClient::from_config(config);
    let agent = AgentLoop::new(&client, gateway, config.max_tool_steps(), agent_descriptors());

    match agent.run(turns, emit).await {
        Ok(answer) => {
            for chunk in chunk_text(&answer, DELTA_CHUNK_CHARS) {
                emit(AgentEvent::Delta { text: chunk });
            }
            emit(AgentEvent::Done);
        }
        Err(e) => {
            tracing::warn!(error = %e, "decision loop failed, falling back to plain completion");
            let mut messages = vec![ChatMessage::system("You are a helpful assistant.")];
            messages.extend(turns.iter().map(ChatTurn::to_message));
            match client
                .stream_complete(messages, |delta| {
                    emit(AgentEvent::Delta { text: delta.to_string() });
                })
                .await
            {
                Ok(_) => emit(AgentEvent::Done),
                Err(fallback_err) => emit(AgentEvent::Error {
                    message: fallback_err.to_string(),
                }),
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ErrorCode, ToolError};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockModel {
        replies: Mutex<VecDeque<String>>,
        invocations: Mutex<usize>,
    }

    impl MockModel {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
                invocations: Mutex::new(0),
            }
        }

        fn invocations(&self) -> usize {
            *self.invocations.lock().unwrap()
        }
    }

    impl ModelEndpoint for MockModel {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, InferenceError> {
            *self.invocations.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(InferenceError::EmptyResponse)
        }
    }

    struct MockTools {
        results: Mutex<VecDeque<Result<ToolOutcome, GatewayError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTools {
        fn new(results: Vec<Result<ToolOutcome, GatewayError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolDispatcher for MockTools {
        async fn dispatch(
            &self,
            name: &str,
            _arguments: &Map<String, Value>,
        ) -> Result<ToolOutcome, GatewayError> {
            self.calls.lock().unwrap().push(name.to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ToolOutcome::new("ok", json!({}))))
        }
    }

    fn loop_with(model: MockModel, tools: MockTools, max_steps: usize) -> AgentLoop<MockModel, MockTools> {
        AgentLoop::new(model, tools, max_steps, agent_descriptors())
    }

    const FINAL: &str = r#"{"type":"final","answer":"done"}"#;
    const SEARCH_CALL: &str =
        r#"{"type":"tool_call","toolName":"web_search","arguments":{"query":"rust"}}"#;

    #[tokio::test]
    async fn test_immediate_final_emits_no_events() {
        let agent = loop_with(MockModel::new(&[FINAL]), MockTools::new(vec![]), 3);
        let mut events = Vec::new();
        let answer = agent
            .run(&[ChatTurn::user("hi")], &mut |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(answer, "done");
        assert!(events.is_empty());
        assert_eq!(agent.model.invocations(), 1);
        assert!(agent.tools.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_final_with_zero_dispatches() {
        let agent = loop_with(
            MockModel::new(&["Paris is the capital of France."]),
            MockTools::new(vec![]),
            3,
        );
        let mut events = Vec::new();
        let answer = agent
            .run(&[ChatTurn::user("capital of France?")], &mut |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(answer, "Paris is the capital of France.");
        assert!(agent.tools.calls().is_empty());
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_name_is_treated_as_final_text() {
        let reply = r#"{"type":"tool_call","toolName":"format_disk","arguments":{}}"#;
        let agent = loop_with(MockModel::new(&[reply]), MockTools::new(vec![]), 3);
        let answer = agent
            .run(&[ChatTurn::user("hi")], &mut |_| {})
            .await
            .unwrap();
        assert_eq!(answer, reply);
        assert!(agent.tools.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tool_call_then_final_appends_sources() {
        let outcome = ToolOutcome::new(
            "Found 2 results",
            json!({
                "provider": "duckduckgo",
                "sources": [
                    { "title": "Rust", "url": "https://rust-lang.org/" },
                    { "title": "Dup", "url": "https://rust-lang.org/" },
                    { "title": "Crates", "url": "https://crates.io/" },
                ],
            }),
        );
        let agent = loop_with(
            MockModel::new(&[SEARCH_CALL, FINAL]),
            MockTools::new(vec![Ok(outcome)]),
            3,
        );
        let mut events = Vec::new();
        let answer = agent
            .run(&[ChatTurn::user("search rust")], &mut |e| events.push(e))
            .await
            .unwrap();

        assert!(answer.starts_with("done"));
        assert!(answer.contains("https://rust-lang.org/"));
        assert!(answer.contains("https://crates.io/"));
        // deduped by url
        assert_eq!(answer.matches("rust-lang.org").count(), 1);
        assert!(answer.contains("(via duckduckgo)"));

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AgentEvent::ToolStart { step: 1, .. }));
        assert!(matches!(events[1], AgentEvent::ToolResult { ok: true, .. }));
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_not_terminal() {
        let denied = GatewayError::Tool(ToolError::new(
            ErrorCode::PathNotAllowed,
            "path is outside the allowed roots",
        ));
        let agent = loop_with(
            MockModel::new(&[
                r#"{"type":"tool_call","toolName":"read_text_file","arguments":{"path":"/etc/passwd"}}"#,
                FINAL,
            ]),
            MockTools::new(vec![Err(denied)]),
            3,
        );
        let mut events = Vec::new();
        let answer = agent
            .run(&[ChatTurn::user("read it")], &mut |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(answer, "done");
        assert!(matches!(
            events[1],
            AgentEvent::ToolResult { ok: false, .. }
        ));
        assert_eq!(agent.model.invocations(), 2);
    }

    #[tokio::test]
    async fn test_step_budget_forces_final_invocation() {
        let agent = loop_with(
            MockModel::new(&[SEARCH_CALL, SEARCH_CALL, SEARCH_CALL, FINAL]),
            MockTools::new(vec![]),
            3,
        );
        let answer = agent
            .run(&[ChatTurn::user("keep searching")], &mut |_| {})
            .await
            .unwrap();
        assert_eq!(answer, "done");
        // three loop invocations plus the forced final
        assert_eq!(agent.model.invocations(), 4);
        assert_eq!(agent.tools.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_forced_final_unparseable_returns_raw_text() {
        let agent = loop_with(
            MockModel::new(&[SEARCH_CALL, "I could not finish."]),
            MockTools::new(vec![]),
            1,
        );
        let answer = agent
            .run(&[ChatTurn::user("go")], &mut |_| {})
            .await
            .unwrap();
        assert_eq!(answer, "I could not finish.");
    }

    #[test]
    fn test_source_collector_caps_at_eight() {
        let mut collector = SourceCollector::default();
        let sources: Vec<Value> = (0..12)
            .map(|i| json!({ "title": format!("t{i}"), "url": format!("https://e.com/{i}") }))
            .collect();
        collector.collect(&json!({ "provider": "bing", "sources": sources }));
        let out = collector.append_to("answer");
        assert_eq!(out.matches("https://e.com/").count(), 8);
    }

    #[test]
    fn test_chunk_text_char_boundaries() {
        let chunks = chunk_text("abcdefg", 3);
        assert_eq!(chunks, vec!["abc", "def", "g"]);
        assert!(chunk_text("", 48).is_empty());
    }
}
