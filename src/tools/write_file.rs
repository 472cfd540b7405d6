//! `create_text_file`, `write_text_file`, `append_text_file`.

use std::io::Write;
use std::path::Path;

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{optional_bool, optional_str, require_str, Args, ErrorCode, ToolError, ToolOutcome};

fn ensure_parent_dir(path: &Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn reject_directory(path: &Path) -> Result<(), ToolError> {
    if path.is_dir() {
        return Err(ToolError::bad_request(format!(
            "target is a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

pub async fn create_text_file(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;
    let content = optional_str(args, "content").unwrap_or_default();
    let overwrite = optional_bool(args, "overwrite", false);

    let policy = LocalFilePolicy::from_config(config);
    let resolved = policy::resolve_and_assert(&input, &policy)?;
    let target = &resolved.absolute_path;
    reject_directory(target)?;

    let existed = target.exists();
    if existed && !overwrite {
        return Err(ToolError::new(
            ErrorCode::AlreadyExists,
            format!("file already exists: {}", target.display()),
        ));
    }

    ensure_parent_dir(target)?;
    std::fs::write(target, content.as_bytes())?;

    Ok(ToolOutcome::new(
        format!(
            "{} {}",
            if existed { "Overwrote" } else { "Created" },
            target.display()
        ),
        json!({
            "path": target.display().to_string(),
            "created": !existed,
            "overwritten": existed,
            "bytes": content.len(),
        }),
    ))
}

pub async fn write_text_file(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;
    let content = match args.get("content") {
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => return Err(ToolError::bad_request("missing argument: content")),
    };
    let overwrite = optional_bool(args, "overwrite", true);

    let policy = LocalFilePolicy::from_config(config);
    let resolved = policy::resolve_and_assert(&input, &policy)?;
    let target = &resolved.absolute_path;
    reject_directory(target)?;

    let existed = target.exists();
    if existed && !overwrite {
        return Err(ToolError::new(
            ErrorCode::AlreadyExists,
            format!("file already exists: {}", target.display()),
        ));
    }

    ensure_parent_dir(target)?;
    std::fs::write(target, content.as_bytes())?;

    Ok(ToolOutcome::new(
        format!("Wrote {} bytes to {}", content.len(), target.display()),
        json!({
            "path": target.display().to_string(),
            "overwritten": existed,
            "bytes": content.len(),
        }),
    ))
}

pub async fn append_text_file(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;
    let content = match args.get("content") {
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => return Err(ToolError::bad_request("missing argument: content")),
    };

    let policy = LocalFilePolicy::from_config(config);
    let resolved = policy::resolve_and_assert(&input, &policy)?;
    let target = &resolved.absolute_path;
    reject_directory(target)?;

    ensure_parent_dir(target)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(target)?;
    file.write_all(content.as_bytes())?;

    Ok(ToolOutcome::new(
        format!(
            "Appended {} bytes to {}",
            content.len(),
            target.display()
        ),
        json!({
            "path": target.display().to_string(),
            "appendedBytes": content.len(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn config_for(root: &Path) -> RuntimeConfig {
        RuntimeConfig::from_pairs([(
            "LOCAL_FILE_ALLOWED_ROOTS",
            root.display().to_string(),
        )])
    }

    fn args(value: Value) -> Args {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_refuses_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();

        let config = config_for(dir.path());
        let err = create_text_file(
            &args(json!({ "path": "a.txt", "content": "new" })),
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_create_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let outcome = create_text_file(
            &args(json!({ "path": "nested/deep/a.txt", "content": "hi" })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["created"], true);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/deep/a.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn test_write_overwrites_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();

        let config = config_for(dir.path());
        let outcome = write_text_file(
            &args(json!({ "path": "a.txt", "content": "new" })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["overwritten"], true);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_respects_overwrite_false() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();

        let config = config_for(dir.path());
        let err = write_text_file(
            &args(json!({ "path": "a.txt", "content": "new", "overwrite": false })),
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_append_creates_then_extends() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        append_text_file(&args(json!({ "path": "log.txt", "content": "one\n" })), &config)
            .await
            .unwrap();
        append_text_file(&args(json!({ "path": "log.txt", "content": "two\n" })), &config)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("log.txt")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_write_outside_root_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let err = write_text_file(
            &args(json!({ "path": "/etc/toolgate-test.txt", "content": "x" })),
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PathNotAllowed);
    }
}
