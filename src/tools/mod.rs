//! Capability handlers.
//!
//! Each submodule implements one or more named tools. Handlers are plain
//! async functions taking a JSON argument object and returning a
//! [`ToolOutcome`] or a classified [`ToolError`]; the gateway registry owns
//! lookup, schema validation and wire formatting.

pub mod access_policy;
pub mod delete_path;
pub mod errors;
pub mod find_files;
pub mod list_files;
pub mod office_text;
pub mod pdf_text;
pub mod policy;
pub mod read_file;
pub mod save_answer;
pub mod transfer;
pub mod weather;
pub mod web_search;
pub mod write_file;

use serde_json::{Map, Value};

pub use errors::{ErrorCode, ToolError};

/// Successful tool result: a human-readable summary plus a structured
/// payload for programmatic consumers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolOutcome {
    pub text: String,
    pub data: Value,
}

impl ToolOutcome {
    pub fn new(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            data,
        }
    }
}

pub type Args = Map<String, Value>;

// ─── Argument helpers ────────────────────────────────────────────────────────

/// Required non-empty string argument.
pub fn require_str(args: &Args, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None => {
            Err(ToolError::bad_request(format!("missing argument: {key}")))
        }
        Some(_) => Err(ToolError::bad_request(format!(
            "argument {key} must be a string"
        ))),
    }
}

/// Optional string argument; empty strings count as absent.
pub fn optional_str(args: &Args, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Optional boolean, defaulting when absent or mistyped.
pub fn optional_bool(args: &Args, key: &str, default: bool) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

/// Optional positive integer clamped into `[1, cap]`; absent, mistyped or
/// non-finite values fall back to `default` (itself capped). Requests may
/// lower a limit below the policy cap but never raise it.
pub fn clamped_limit(args: &Args, key: &str, default: usize, cap: usize) -> usize {
    let requested = match args.get(key) {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                Some(v as usize)
            } else {
                // negative or non-integer numerics clamp from f64
                n.as_f64().filter(|f| f.is_finite()).map(|f| {
                    if f < 1.0 {
                        1
                    } else {
                        f as usize
                    }
                })
            }
        }
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    requested.unwrap_or(default).clamp(1, cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_require_str_rejects_blank() {
        let a = args(json!({ "path": "   " }));
        let err = require_str(&a, "path").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_clamped_limit_caps_and_floors() {
        let a = args(json!({ "max_entries": 9999 }));
        assert_eq!(clamped_limit(&a, "max_entries", 100, 500), 500);

        let a = args(json!({ "max_entries": -3 }));
        assert_eq!(clamped_limit(&a, "max_entries", 100, 500), 1);

        let a = args(json!({ "max_entries": "many" }));
        assert_eq!(clamped_limit(&a, "max_entries", 100, 500), 100);

        let a = args(json!({}));
        assert_eq!(clamped_limit(&a, "max_entries", 100, 500), 100);
    }

    #[test]
    fn test_optional_bool_ignores_mistyped() {
        let a = args(json!({ "recursive": "yes" }));
        assert!(!optional_bool(&a, "recursive", false));
        let a = args(json!({ "recursive": true }));
        assert!(optional_bool(&a, "recursive", false));
    }
}
