//! `read_text_file`: bounded UTF-8 file read.

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{clamped_limit, require_str, Args, ErrorCode, ToolError, ToolOutcome};

/// Truncate on a character boundary, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }
    (text.chars().take(max_chars).collect(), true)
}

pub async fn read_text_file(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;

    let policy = LocalFilePolicy::from_config(config);
    let max_chars = clamped_limit(args, "max_chars", policy.max_read_chars, policy.max_read_chars);

    let resolved = policy::resolve_existing_path(&input, &policy)?;
    if resolved.absolute_path.is_dir() {
        return Err(ToolError::bad_request(format!(
            "is a directory, not a file: {}",
            resolved.absolute_path.display()
        )));
    }

    let bytes = std::fs::read(&resolved.absolute_path)?;
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            return Err(ToolError::new(
                ErrorCode::UnsupportedContent,
                format!(
                    "not valid UTF-8 text: {}",
                    resolved.absolute_path.display()
                ),
            ))
        }
    };

    let total_chars = content.chars().count();
    let (returned, truncated) = truncate_chars(&content, max_chars);
    let returned_chars = returned.chars().count();

    let text = format!(
        "Read {returned_chars} of {total_chars} chars from {}{}",
        resolved.absolute_path.display(),
        if truncated { " (truncated)" } else { "" }
    );

    Ok(ToolOutcome::new(
        text,
        json!({
            "path": resolved.absolute_path.display().to_string(),
            "truncated": truncated,
            "totalChars": total_chars,
            "returnedChars": returned_chars,
            "content": returned,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn config_for(root: &std::path::Path) -> RuntimeConfig {
        RuntimeConfig::from_pairs([(
            "LOCAL_FILE_ALLOWED_ROOTS",
            root.display().to_string(),
        )])
    }

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_reads_relative_path_against_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "hello world").unwrap();

        let config = config_for(dir.path());
        let outcome = read_text_file(&args(json!({ "path": "note.txt" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["content"], "hello world");
        assert_eq!(outcome.data["truncated"], false);
        assert_eq!(outcome.data["totalChars"], 11);
    }

    #[tokio::test]
    async fn test_truncates_to_max_chars() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "abcdefghij").unwrap();

        let config = config_for(dir.path());
        let outcome = read_text_file(
            &args(json!({ "path": "big.txt", "max_chars": 4 })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["content"], "abcd");
        assert_eq!(outcome.data["truncated"], true);
        assert_eq!(outcome.data["returnedChars"], 4);
        assert_eq!(outcome.data["totalChars"], 10);
    }

    #[tokio::test]
    async fn test_non_utf8_is_unsupported_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let config = config_for(dir.path());
        let err = read_text_file(&args(json!({ "path": "blob.bin" })), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedContent);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let err = read_text_file(&args(json!({ "path": "ghost.txt" })), &config)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (out, truncated) = truncate_chars("héllo", 2);
        assert_eq!(out, "hé");
        assert!(truncated);
    }
}
