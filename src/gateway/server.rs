//! Worker-side serve loop.
//!
//! Reads line-delimited JSON-RPC requests from stdin and writes responses to
//! stdout. stdout is reserved for the protocol; all logging goes to stderr.
//! Non-JSON input lines are skipped, EOF ends the loop.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::tools::ToolError;

use super::registry;
use super::types::{
    error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallParams, METHOD_INITIALIZE,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};

fn tool_error_response(id: u64, error: ToolError) -> JsonRpcResponse {
    JsonRpcResponse::failure(
        Some(id),
        JsonRpcError {
            code: error_codes::TOOL_ERROR,
            message: error.message.clone(),
            data: Some(json!({ "code": error.code, "details": error.details })),
        },
    )
}

/// Handle one request. Handler panics cannot happen by construction; every
/// failure path is a classified error response.
pub async fn handle_request(request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id;
    match request.method.as_str() {
        METHOD_INITIALIZE | METHOD_TOOLS_LIST => {
            JsonRpcResponse::success(id, json!({ "tools": registry::descriptors() }))
        }
        METHOD_TOOLS_CALL => {
            let params: ToolCallParams = match serde_json::from_value(request.params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::failure(
                        Some(id),
                        JsonRpcError {
                            code: error_codes::INVALID_PARAMS,
                            message: format!("invalid tools/call params: {e}"),
                            data: None,
                        },
                    )
                }
            };

            let table = registry::descriptors();
            let Some(descriptor) = registry::find_descriptor(&table, &params.name) else {
                return tool_error_response(
                    id,
                    ToolError::new(
                        crate::tools::ErrorCode::ToolNotFound,
                        format!("no such tool: {}", params.name),
                    ),
                );
            };
            if let Err(e) = registry::validate_arguments(descriptor, &params.arguments) {
                return tool_error_response(id, e);
            }

            tracing::info!(tool = %params.name, "tool call");
            match registry::dispatch(&params.name, &params.arguments).await {
                Ok(outcome) => JsonRpcResponse::success(
                    id,
                    json!({ "text": outcome.text, "data": outcome.data }),
                ),
                Err(e) => {
                    tracing::warn!(tool = %params.name, code = %e.code, error = %e.message, "tool call failed");
                    tool_error_response(id, e)
                }
            }
        }
        other => JsonRpcResponse::failure(
            Some(id),
            JsonRpcError {
                code: error_codes::METHOD_NOT_FOUND,
                message: format!("unknown method: {other}"),
                data: None,
            },
        ),
    }
}

/// Run the serve loop until stdin closes.
pub async fn serve() -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "skipping non-protocol input line");
                continue;
            }
        };

        let response = handle_request(request).await;
        let mut encoded = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                // response content failed to serialize; degrade to a generic error
                tracing::error!(error = %e, "failed to encode response");
                serde_json::to_string(&JsonRpcResponse::failure(
                    response.id,
                    JsonRpcError {
                        code: error_codes::INTERNAL_ERROR,
                        message: "failed to encode response".into(),
                        data: None,
                    },
                ))
                .unwrap_or_else(|_| String::from("{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"encode failure\"}}"))
            }
        };
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    tracing::debug!("stdin closed, serve loop ending");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_and_tools_list_return_the_table() {
        for method in [METHOD_INITIALIZE, METHOD_TOOLS_LIST] {
            let response =
                handle_request(JsonRpcRequest::new(1, method, Value::Null)).await;
            let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
            assert!(tools >= 15, "expected full table, got {tools}");
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response =
            handle_request(JsonRpcRequest::new(2, "tools/destroy", Value::Null)).await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_tool_not_found() {
        let response = handle_request(JsonRpcRequest::new(
            3,
            METHOD_TOOLS_CALL,
            json!({ "name": "frobnicate", "arguments": {} }),
        ))
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::TOOL_ERROR);
        assert_eq!(error.data.unwrap()["code"], "TOOL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_validation_failure_never_executes() {
        // delete_path without its required fields must fail validation,
        // not reach the handler
        let response = handle_request(JsonRpcRequest::new(
            4,
            METHOD_TOOLS_CALL,
            json!({ "name": "delete_path", "arguments": {} }),
        ))
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.data.unwrap()["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let response = handle_request(JsonRpcRequest::new(
            5,
            METHOD_TOOLS_CALL,
            json!({ "name": "ping", "arguments": { "message": "hello" } }),
        ))
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["text"], "hello");
        assert_eq!(result["data"]["ok"], true);
    }
}
