//! `delete_path`: guarded removal.
//!
//! The confirmation token is checked before any path work so a missing
//! token never leaks information about what exists.

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{optional_bool, optional_str, require_str, Args, ErrorCode, ToolError, ToolOutcome};

const CONFIRM_TOKEN: &str = "DELETE";

pub async fn delete_path(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    if optional_str(args, "confirm").as_deref() != Some(CONFIRM_TOKEN) {
        return Err(ToolError::new(
            ErrorCode::ConfirmRequired,
            format!("deletion requires confirm: \"{CONFIRM_TOKEN}\""),
        ));
    }

    let input = require_str(args, "path")?;
    let recursive = optional_bool(args, "recursive", false);

    let policy = LocalFilePolicy::from_config(config);
    let resolved = policy::resolve_existing_path(&input, &policy)?;
    let target = &resolved.absolute_path;

    if policy::is_allowed_root(target, &policy) {
        return Err(ToolError::new(
            ErrorCode::DeleteDenied,
            format!("refusing to delete an allowed root: {}", target.display()),
        ));
    }

    let deleted_type;
    if target.is_dir() {
        if !recursive {
            return Err(ToolError::bad_request(format!(
                "deleting a directory requires recursive: true: {}",
                target.display()
            )));
        }
        std::fs::remove_dir_all(target)?;
        deleted_type = "dir";
    } else {
        std::fs::remove_file(target)?;
        deleted_type = "file";
    }

    tracing::info!(path = %target.display(), deleted_type, "deleted path");

    Ok(ToolOutcome::new(
        format!("Deleted {}", target.display()),
        json!({
            "path": target.display().to_string(),
            "deletedType": deleted_type,
        }),
    ))
}
