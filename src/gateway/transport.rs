//! Worker process transport.
//!
//! Each tool call gets its own worker: the current executable re-invoked
//! with the `serve` argument, talked to over piped stdio with one
//! line-delimited JSON-RPC request and one response. The worker is killed
//! and reaped on every exit path; dropping the connection mid-call kills it
//! too, which covers cancellation.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::tools::{ErrorCode, ToolError};

use super::errors::GatewayError;
use super::types::{error_codes, JsonRpcRequest, JsonRpcResponse};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct WorkerConnection {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerConnection {
    /// Spawn a fresh worker process running the serve loop.
    pub fn spawn() -> Result<Self, GatewayError> {
        let exe = std::env::current_exe().map_err(GatewayError::Spawn)?;
        let mut child = Command::new(exe)
            .arg("serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(GatewayError::Spawn)?;

        let stdin = child.stdin.take().ok_or(GatewayError::StdioUnavailable)?;
        let stdout = child.stdout.take().ok_or(GatewayError::StdioUnavailable)?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// Send one request and await the matching response.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = next_request_id();
        let request = JsonRpcRequest::new(id, method, params);
        let mut line = serde_json::to_string(&request)
            .map_err(|e| GatewayError::Protocol(format!("encoding request: {e}")))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(GatewayError::ClosedStream);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // stray stdout noise from the worker is skipped
            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) else {
                tracing::debug!(line = trimmed, "skipping non-protocol worker output");
                continue;
            };
            if response.id != Some(id) {
                continue;
            }
            return extract_result(response);
        }
    }

    /// Kill the worker and reap it.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "worker already gone at shutdown");
        }
        // kill() waits, but be explicit about reaping
        let _ = self.child.try_wait();
    }
}

/// Unwrap a response: tool failures come back typed, everything else is a
/// protocol error.
fn extract_result(response: JsonRpcResponse) -> Result<Value, GatewayError> {
    if let Some(error) = response.error {
        if error.code == error_codes::TOOL_ERROR {
            if let Some(data) = &error.data {
                let code: ErrorCode = serde_json::from_value(data["code"].clone())
                    .unwrap_or(ErrorCode::InternalError);
                return Err(GatewayError::Tool(ToolError {
                    code,
                    message: error.message,
                    details: data.get("details").filter(|d| !d.is_null()).cloned(),
                }));
            }
        }
        return Err(GatewayError::Protocol(format!(
            "worker error {}: {}",
            error.code, error.message
        )));
    }
    response
        .result
        .ok_or_else(|| GatewayError::Protocol("response carried neither result nor error".into()))
}
