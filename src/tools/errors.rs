//! Typed tool failures.
//!
//! Every capability handler reports failure as a `ToolError` with a stable
//! machine-readable code. The registry serializes these across the gateway
//! boundary; nothing else is allowed to cross it unlabeled.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Error Codes ─────────────────────────────────────────────────────────────

/// Stable error codes shared by all capability handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or missing arguments.
    BadRequest,
    /// Required policy configuration absent.
    MissingConfig,
    /// Path falls outside every allowed root.
    PathNotAllowed,
    NotFound,
    AlreadyExists,
    /// Destructive operation missing the confirmation token.
    ConfirmRequired,
    /// Deletion of an allowed root itself.
    DeleteDenied,
    /// File exists but no usable text could be extracted.
    UnsupportedContent,
    /// External service returned a non-success status.
    UpstreamError,
    /// External service could not be reached.
    UpstreamNetworkError,
    /// Every configured fallback was exhausted.
    UpstreamUnavailable,
    ToolNotFound,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::MissingConfig => "MISSING_CONFIG",
            ErrorCode::PathNotAllowed => "PATH_NOT_ALLOWED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::ConfirmRequired => "CONFIRM_REQUIRED",
            ErrorCode::DeleteDenied => "DELETE_DENIED",
            ErrorCode::UnsupportedContent => "UNSUPPORTED_CONTENT",
            ErrorCode::UpstreamError => "UPSTREAM_ERROR",
            ErrorCode::UpstreamNetworkError => "UPSTREAM_NETWORK_ERROR",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

// ─── ToolError ───────────────────────────────────────────────────────────────

/// A classified capability failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn missing_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingConfig, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::not_found(e.to_string()),
            std::io::ErrorKind::AlreadyExists => {
                ToolError::new(ErrorCode::AlreadyExists, e.to_string())
            }
            _ => ToolError::internal(e.to_string()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
