//! `list_local_files`: directory listing under the access policy.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{clamped_limit, optional_bool, require_str, Args, ToolError, ToolOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntry {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

pub(crate) fn entry_for(path: &Path) -> ListedEntry {
    let metadata = std::fs::symlink_metadata(path).ok();
    let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
    let updated_at = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    ListedEntry {
        path: path.display().to_string(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        entry_type: if is_dir { "dir" } else { "file" },
        size: metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
        updated_at,
    }
}

/// Read one directory's entries, sorted directories-first then by name.
fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    children.sort_by(|a, b| {
        let ad = a.is_dir();
        let bd = b.is_dir();
        bd.cmp(&ad).then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(children)
}

pub async fn list_local_files(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;
    let recursive = optional_bool(args, "recursive", false);

    let policy = LocalFilePolicy::from_config(config);
    let max_entries = clamped_limit(args, "max_entries", policy.max_list_entries, policy.max_list_entries);

    let resolved = policy::resolve_existing_path(&input, &policy)?;
    if !resolved.absolute_path.is_dir() {
        return Err(ToolError::bad_request(format!(
            "not a directory: {}",
            resolved.absolute_path.display()
        )));
    }

    let mut items = Vec::new();
    let mut truncated = false;
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(resolved.absolute_path.clone());

    'walk: while let Some(dir) = queue.pop_front() {
        let children = match read_dir_sorted(&dir) {
            Ok(c) => c,
            // unreadable subdirectories are skipped, not fatal
            Err(e) if dir != resolved.absolute_path => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
            Err(e) => return Err(e),
        };
        for child in children {
            if items.len() >= max_entries {
                truncated = true;
                break 'walk;
            }
            let entry = entry_for(&child);
            let is_dir = entry.entry_type == "dir";
            items.push(entry);
            if recursive && is_dir {
                queue.push_back(child);
            }
        }
    }

    let count = items.len();
    let text = format!(
        "Listed {count} entr{} under {}{}",
        if count == 1 { "y" } else { "ies" },
        resolved.absolute_path.display(),
        if truncated { " (truncated)" } else { "" }
    );

    Ok(ToolOutcome::new(
        text,
        json!({
            "root": resolved.allowed_root.display().to_string(),
            "queryPath": resolved.absolute_path.display().to_string(),
            "count": count,
            "truncated": truncated,
            "items": items,
        }),
    ))
}
