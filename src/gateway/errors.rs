//! Gateway client failures.

use thiserror::Error;

use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to spawn tool worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker stdio unavailable")]
    StdioUnavailable,

    #[error("tool call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("worker closed the stream before responding")]
    ClosedStream,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("i/o error talking to worker: {0}")]
    Io(#[from] std::io::Error),

    /// A classified failure from the tool itself; recoverable from the
    /// agent loop's point of view.
    #[error(transparent)]
    Tool(#[from] ToolError),
}
