//! `copy_path`, `move_path`, `rename_path`.

use std::path::Path;

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{optional_bool, require_str, Args, ErrorCode, ToolError, ToolOutcome};

fn entry_kind(path: &Path) -> &'static str {
    if path.is_dir() {
        "dir"
    } else {
        "file"
    }
}

fn copy_recursive(from: &Path, to: &Path) -> Result<(), ToolError> {
    if from.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> Result<(), ToolError> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Resolve source (must exist) and destination (create-style), enforcing the
/// overwrite flag on the destination.
fn resolve_endpoints(
    args: &Args,
    policy: &LocalFilePolicy,
) -> Result<(std::path::PathBuf, std::path::PathBuf, bool), ToolError> {
    let from = policy::resolve_existing_path(&require_str(args, "from")?, policy)?;
    let to = policy::resolve_and_assert(&require_str(args, "to")?, policy)?;
    let overwrite = optional_bool(args, "overwrite", false);

    // a destination inside the source would recurse into its own output,
    // and a source inside the destination would be destroyed on overwrite
    if to.absolute_path.starts_with(&from.absolute_path)
        || from.absolute_path.starts_with(&to.absolute_path)
    {
        return Err(ToolError::bad_request(format!(
            "source and destination overlap: {} and {}",
            from.absolute_path.display(),
            to.absolute_path.display()
        )));
    }

    if to.absolute_path.exists() && !overwrite {
        return Err(ToolError::new(
            ErrorCode::AlreadyExists,
            format!("destination already exists: {}", to.absolute_path.display()),
        ));
    }
    Ok((from.absolute_path, to.absolute_path, overwrite))
}

pub async fn copy_path(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let policy = LocalFilePolicy::from_config(config);
    let (from, to, _) = resolve_endpoints(args, &policy)?;

    let kind = entry_kind(&from);
    let overwritten = to.exists();
    if overwritten {
        remove_any(&to)?;
    }
    copy_recursive(&from, &to)?;

    Ok(ToolOutcome::new(
        format!("Copied {} to {}", from.display(), to.display()),
        json!({
            "from": from.display().to_string(),
            "to": to.display().to_string(),
            "copiedType": kind,
            "overwritten": overwritten,
        }),
    ))
}

pub async fn move_path(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let policy = LocalFilePolicy::from_config(config);
    let (from, to, _) = resolve_endpoints(args, &policy)?;

    let kind = entry_kind(&from);
    let overwritten = to.exists();
    if overwritten {
        remove_any(&to)?;
    }
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // rename fails across filesystems; fall back to copy + remove
    if let Err(e) = std::fs::rename(&from, &to) {
        if e.raw_os_error() == Some(libc_exdev()) {
            copy_recursive(&from, &to)?;
            remove_any(&from)?;
        } else {
            return Err(e.into());
        }
    }

    Ok(ToolOutcome::new(
        format!("Moved {} to {}", from.display(), to.display()),
        json!({
            "from": from.display().to_string(),
            "to": to.display().to_string(),
            "movedType": kind,
            "overwritten": overwritten,
        }),
    ))
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    17 // ERROR_NOT_SAME_DEVICE
}

pub async fn rename_path(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let new_name = require_str(args, "new_name")?;
    if new_name.contains('/') || new_name.contains('\\') {
        return Err(ToolError::bad_request(
            "new_name must be a bare name without path separators",
        ));
    }

    let policy = LocalFilePolicy::from_config(config);
    let from = policy::resolve_existing_path(&require_str(args, "path")?, &policy)?;

    let parent = from
        .absolute_path
        .parent()
        .ok_or_else(|| ToolError::bad_request("cannot rename a filesystem root"))?;
    let to = policy::assert_path_allowed(&parent.join(&new_name), &policy)?;

    if to.absolute_path.exists() {
        return Err(ToolError::new(
            ErrorCode::AlreadyExists,
            format!("target already exists: {}", to.absolute_path.display()),
        ));
    }

    let kind = entry_kind(&from.absolute_path);
    std::fs::rename(&from.absolute_path, &to.absolute_path)?;

    Ok(ToolOutcome::new(
        format!(
            "Renamed {} to {new_name}",
            from.absolute_path.display()
        ),
        json!({
            "from": from.absolute_path.display().to_string(),
            "to": to.absolute_path.display().to_string(),
            "renamedType": kind,
        }),
    ))
}
