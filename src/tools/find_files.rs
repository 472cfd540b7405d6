//! `find_local_files`: breadth-first name search across the allowed roots.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::config::RuntimeConfig;

use super::list_files::ListedEntry;
use super::policy::{self, LocalFilePolicy};
use super::{clamped_limit, optional_bool, require_str, Args, ToolError, ToolOutcome};

/// Resolve the search roots: the caller's explicit roots (each containment
/// checked) or, by default, every allowed root.
fn search_roots(args: &Args, policy: &LocalFilePolicy) -> Result<Vec<PathBuf>, ToolError> {
    let explicit = match args.get("roots") {
        Some(Value::Array(values)) => {
            let mut roots = Vec::new();
            for value in values {
                let raw = value
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ToolError::bad_request("roots must be non-empty strings"))?;
                let resolved = policy::resolve_existing_path(raw, policy)?;
                roots.push(resolved.absolute_path);
            }
            Some(roots)
        }
        _ => None,
    };

    match explicit {
        Some(roots) if !roots.is_empty() => Ok(roots),
        _ => {
            if policy.allowed_roots.is_empty() {
                return Err(ToolError::missing_config(
                    "LOCAL_FILE_ALLOWED_ROOTS is not configured; nothing to search",
                ));
            }
            Ok(policy.allowed_roots.clone())
        }
    }
}

pub async fn find_local_files(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let query = require_str(args, "query")?;
    let needle = query.to_lowercase();
    let include_dirs = optional_bool(args, "include_dirs", true);

    let policy = LocalFilePolicy::from_config(config);
    let max_entries = clamped_limit(args, "max_entries", policy.max_list_entries, policy.max_list_entries);

    let roots = search_roots(args, &policy)?;

    let mut items: Vec<ListedEntry> = Vec::new();
    let mut truncated = false;
    let mut queue: VecDeque<PathBuf> = roots.iter().cloned().collect();

    'walk: while let Some(dir) = queue.pop_front() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            // permission errors and races just skip the directory
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        let mut children: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        children.sort();

        for child in children {
            let is_dir = child.is_dir();
            let name = child
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if name.to_lowercase().contains(&needle) && (include_dirs || !is_dir) {
                if items.len() >= max_entries {
                    truncated = true;
                    break 'walk;
                }
                items.push(super::list_files::entry_for(&child));
            }
            if is_dir {
                queue.push_back(child);
            }
        }
    }

    let count = items.len();
    let text = format!(
        "Found {count} match{} for \"{query}\"{}",
        if count == 1 { "" } else { "es" },
        if truncated { " (truncated)" } else { "" }
    );

    Ok(ToolOutcome::new(
        text,
        json!({
            "query": query,
            "rootCount": roots.len(),
            "count": count,
            "truncated": truncated,
            "items": items,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ErrorCode;

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
    async fn test_breadth_first_substring_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report-2024.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("reports")).unwrap();
        std::fs::write(dir.path().join("reports").join("q1-report.md"), "x").unwrap();
        std::fs::write(dir.path().join("other.txt"), "x").unwrap();

        let config = config_for(dir.path());
        let outcome = find_local_files(&args(json!({ "query": "report" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["count"], 3);
        assert_eq!(outcome.data["rootCount"], 1);
        assert_eq!(outcome.data["truncated"], false);
    }

    #[tokio::test]
    async fn test_include_dirs_false_filters_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let config = config_for(dir.path());
        let outcome = find_local_files(
            &args(json!({ "query": "notes", "include_dirs": false })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["count"], 1);
        assert_eq!(outcome.data["items"][0]["name"], "notes.txt");
    }

    #[tokio::test]
    async fn test_truncation_sets_flag() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            std::fs::write(dir.path().join(format!("match-{i}.txt")), "x").unwrap();
        }

        let config = config_for(dir.path());
        let outcome = find_local_files(
            &args(json!({ "query": "match", "max_entries": 4 })),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(outcome.data["count"], 4);
        assert_eq!(outcome.data["truncated"], true);
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();

        let config = config_for(dir.path());
        let outcome = find_local_files(&args(json!({ "query": "readme" })), &config)
            .await
            .unwrap();
        assert_eq!(outcome.data["count"], 1);
    }

    #[tokio::test]
    async fn test_explicit_root_outside_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();

        let config = config_for(dir.path());
        let err = find_local_files(
            &args(json!({
                "query": "x",
                "roots": [outside.path().display().to_string()],
            })),
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PathNotAllowed);
    }
}
