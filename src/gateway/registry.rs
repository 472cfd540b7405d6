//! Capability registry: the static tool table, request validation, and
//! dispatch into the handlers.

use serde_json::{json, Value};

use crate::config::RuntimeConfig;
use crate::tools::{
    self, access_policy, delete_path, find_files, list_files, office_text, pdf_text, read_file,
    save_answer, transfer, weather, web_search, write_file, Args, ToolError, ToolOutcome,
};

use super::types::ToolDescriptor;

/// Tools the model may request from the decision loop. `ping`,
/// `save_chat_answer` and `list_save_targets` are registry-only and stay off
/// this list.
pub const AGENT_TOOL_NAMES: &[&str] = &[
    "get_weather",
    "web_search",
    "list_local_files",
    "read_text_file",
    "extract_pdf_text",
    "read_office_file",
    "get_local_access_policy",
    "create_text_file",
    "write_text_file",
    "append_text_file",
    "copy_path",
    "move_path",
    "rename_path",
    "delete_path",
    "find_local_files",
];

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn descriptor(name: &str, description: &str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Build the full capability table. Static content; built once per worker.
pub fn descriptors() -> Vec<ToolDescriptor> {
    let path = json!({ "type": "string", "description": "Absolute path, or relative to an allowed root" });
    vec![
        descriptor(
            "ping",
            "Health probe; echoes the optional message.",
            schema(json!({ "message": { "type": "string" } }), &[]),
        ),
        descriptor(
            "get_weather",
            "Current conditions and a short forecast for a location.",
            schema(
                json!({
                    "query": { "type": "string", "description": "Location, possibly phrased as a question" },
                    "days": { "type": "integer", "minimum": 1, "maximum": 3 },
                }),
                &["query"],
            ),
        ),
        descriptor(
            "web_search",
            "Web search with automatic backend fallback.",
            schema(
                json!({
                    "query": { "type": "string" },
                    "max_results": { "type": "integer", "minimum": 1, "maximum": 10 },
                }),
                &["query"],
            ),
        ),
        descriptor(
            "list_local_files",
            "List a directory under the allowed roots.",
            schema(
                json!({
                    "path": path,
                    "recursive": { "type": "boolean" },
                    "max_entries": { "type": "integer" },
                }),
                &["path"],
            ),
        ),
        descriptor(
            "read_text_file",
            "Read a UTF-8 text file, bounded by the policy read limit.",
            schema(
                json!({ "path": path, "max_chars": { "type": "integer" } }),
                &["path"],
            ),
        ),
        descriptor(
            "extract_pdf_text",
            "Extract text from the first pages of a PDF.",
            schema(
                json!({ "path": path, "max_pages": { "type": "integer" } }),
                &["path"],
            ),
        ),
        descriptor(
            "read_office_file",
            "Extract text from a docx, xlsx or pptx document.",
            schema(
                json!({ "path": path, "max_chars": { "type": "integer" } }),
                &["path"],
            ),
        ),
        descriptor(
            "get_local_access_policy",
            "Report the allowed roots and read limits.",
            schema(json!({}), &[]),
        ),
        descriptor(
            "create_text_file",
            "Create a new text file; fails if it exists unless overwrite is set.",
            schema(
                json!({
                    "path": path,
                    "content": { "type": "string" },
                    "overwrite": { "type": "boolean" },
                }),
                &["path"],
            ),
        ),
        descriptor(
            "write_text_file",
            "Write a text file, overwriting by default.",
            schema(
                json!({
                    "path": path,
                    "content": { "type": "string" },
                    "overwrite": { "type": "boolean" },
                }),
                &["path", "content"],
            ),
        ),
        descriptor(
            "append_text_file",
            "Append to a text file, creating it if missing.",
            schema(
                json!({ "path": path, "content": { "type": "string" } }),
                &["path", "content"],
            ),
        ),
        descriptor(
            "copy_path",
            "Copy a file or directory within the allowed roots.",
            schema(
                json!({
                    "from": path,
                    "to": path,
                    "overwrite": { "type": "boolean" },
                }),
                &["from", "to"],
            ),
        ),
        descriptor(
            "move_path",
            "Move a file or directory within the allowed roots.",
            schema(
                json!({
                    "from": path,
                    "to": path,
                    "overwrite": { "type": "boolean" },
                }),
                &["from", "to"],
            ),
        ),
        descriptor(
            "rename_path",
            "Rename a file or directory in place.",
            schema(
                json!({
                    "path": path,
                    "new_name": { "type": "string", "description": "Bare name without separators" },
                }),
                &["path", "new_name"],
            ),
        ),
        descriptor(
            "delete_path",
            "Delete a file or directory; requires confirm: \"DELETE\".",
            schema(
                json!({
                    "path": path,
                    "recursive": { "type": "boolean" },
                    "confirm": { "type": "string", "description": "Must be the literal string DELETE" },
                }),
                &["path", "confirm"],
            ),
        ),
        descriptor(
            "find_local_files",
            "Breadth-first name search across the allowed roots.",
            schema(
                json!({
                    "query": { "type": "string", "description": "Case-insensitive name substring" },
                    "roots": { "type": "array", "items": { "type": "string" } },
                    "max_entries": { "type": "integer" },
                    "include_dirs": { "type": "boolean" },
                }),
                &["query"],
            ),
        ),
        descriptor(
            "save_chat_answer",
            "Save an answer to the configured document store.",
            schema(
                json!({
                    "title": { "type": "string" },
                    "answer": { "type": "string" },
                    "parent_page_id": { "type": "string" },
                }),
                &["answer"],
            ),
        ),
        descriptor(
            "list_save_targets",
            "List document-store save destinations.",
            schema(json!({ "query": { "type": "string" } }), &[]),
        ),
    ]
}

/// Check the required fields of a tool's schema before invoking it. Nothing
/// executes when validation fails.
pub fn validate_arguments(descriptor: &ToolDescriptor, args: &Args) -> Result<(), ToolError> {
    let Some(required) = descriptor.input_schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    for field in required {
        let Some(name) = field.as_str() else { continue };
        if !args.contains_key(name) {
            return Err(ToolError::bad_request(format!(
                "missing required argument for {}: {name}",
                descriptor.name
            )));
        }
    }
    Ok(())
}

async fn ping(args: &Args) -> Result<ToolOutcome, ToolError> {
    let message = tools::optional_str(args, "message").unwrap_or_else(|| "pong".to_string());
    Ok(ToolOutcome::new(
        message.clone(),
        json!({ "message": message, "ok": true }),
    ))
}

/// Invoke a tool by name. Configuration is loaded fresh here so edits apply
/// on the next call.
pub async fn dispatch(name: &str, args: &Args) -> Result<ToolOutcome, ToolError> {
    let config = RuntimeConfig::load();
    dispatch_with_config(name, args, &config).await
}

pub async fn dispatch_with_config(
    name: &str,
    args: &Args,
    config: &RuntimeConfig,
) -> Result<ToolOutcome, ToolError> {
    match name {
        "ping" => ping(args).await,
        "get_weather" => weather::get_weather(args, config).await,
        "web_search" => web_search::web_search(args, config).await,
        "list_local_files" => list_files::list_local_files(args, config).await,
        "read_text_file" => read_file::read_text_file(args, config).await,
        "extract_pdf_text" => pdf_text::extract_pdf_text(args, config).await,
        "read_office_file" => office_text::read_office_file(args, config).await,
        "get_local_access_policy" => access_policy::get_local_access_policy(args, config).await,
        "create_text_file" => write_file::create_text_file(args, config).await,
        "write_text_file" => write_file::write_text_file(args, config).await,
        "append_text_file" => write_file::append_text_file(args, config).await,
        "copy_path" => transfer::copy_path(args, config).await,
        "move_path" => transfer::move_path(args, config).await,
        "rename_path" => transfer::rename_path(args, config).await,
        "delete_path" => delete_path::delete_path(args, config).await,
        "find_local_files" => find_files::find_local_files(args, config).await,
        "save_chat_answer" => save_answer::save_chat_answer(args, config).await,
        "list_save_targets" => save_answer::list_save_targets(args, config).await,
        other => Err(ToolError::new(
            tools::ErrorCode::ToolNotFound,
            format!("no such tool: {other}"),
        )),
    }
}

pub fn find_descriptor<'a>(table: &'a [ToolDescriptor], name: &str) -> Option<&'a ToolDescriptor> {
    table.iter().find(|d| d.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_agent_tool_has_a_descriptor() {
        let table = descriptors();
        for name in AGENT_TOOL_NAMES {
            assert!(
                find_descriptor(&table, name).is_some(),
                "missing descriptor for {name}"
            );
        }
    }

    #[test]
    fn test_registry_only_tools_are_not_agent_callable() {
        for name in ["ping", "save_chat_answer", "list_save_targets"] {
            assert!(!AGENT_TOOL_NAMES.contains(&name));
            assert!(find_descriptor(&descriptors(), name).is_some());
        }
    }

    #[test]
    fn test_validate_rejects_missing_required_field() {
        let table = descriptors();
        let d = find_descriptor(&table, "read_text_file").unwrap();
        let err = validate_arguments(d, &Args::new()).unwrap_err();
        assert_eq!(err.code, tools::ErrorCode::BadRequest);

        let mut args = Args::new();
        args.insert("path".into(), Value::String("/tmp/a.txt".into()));
        assert!(validate_arguments(d, &args).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let config = RuntimeConfig::from_pairs::<_, String, String>([]);
        let err = dispatch_with_config("frobnicate", &Args::new(), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, tools::ErrorCode::ToolNotFound);
    }

    #[tokio::test]
    async fn test_dispatch_ping() {
        let config = RuntimeConfig::from_pairs::<_, String, String>([]);
        let outcome = dispatch_with_config("ping", &Args::new(), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["ok"], true);
    }
}
