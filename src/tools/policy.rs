//! Local filesystem access policy.
//!
//! Every filesystem capability resolves its path through this module before
//! touching storage. The policy is an allowlist of root directories plus
//! numeric read/listing limits, rebuilt from `RuntimeConfig` on every
//! invocation so configuration edits apply on the next call.
//!
//! Containment is a full-path-segment check: `/data/app` never contains its
//! sibling `/data/app-other`. Canonicalization is best-effort and lexical
//! (`.` and `..` components are folded without touching the filesystem);
//! symlink races are explicitly out of scope.

use std::path::{Component, Path, PathBuf};

use serde_json::json;

use crate::config::{
    RuntimeConfig, DEFAULT_MAX_LIST_ENTRIES, DEFAULT_MAX_PDF_PAGES, DEFAULT_MAX_READ_CHARS,
};

use super::errors::{ErrorCode, ToolError};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// The access policy every filesystem operation is checked against.
#[derive(Debug, Clone)]
pub struct LocalFilePolicy {
    /// Allowed root directories, in configured order.
    pub allowed_roots: Vec<PathBuf>,
    pub max_read_chars: usize,
    pub max_list_entries: usize,
    pub max_pdf_pages: usize,
}

impl LocalFilePolicy {
    /// Build the policy from runtime configuration.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let allowed_roots = config
            .get("LOCAL_FILE_ALLOWED_ROOTS")
            .map(|raw| parse_allowed_roots(&raw))
            .unwrap_or_default();

        Self {
            allowed_roots,
            max_read_chars: config.get_clamped(
                "LOCAL_FILE_MAX_READ_CHARS",
                DEFAULT_MAX_READ_CHARS as u64,
                500,
                200_000,
            ) as usize,
            max_list_entries: config.get_clamped(
                "LOCAL_FILE_MAX_LIST_ENTRIES",
                DEFAULT_MAX_LIST_ENTRIES as u64,
                1,
                5_000,
            ) as usize,
            max_pdf_pages: config.get_clamped(
                "LOCAL_FILE_MAX_PDF_PAGES",
                DEFAULT_MAX_PDF_PAGES as u64,
                1,
                300,
            ) as usize,
        }
    }

    /// Test constructor with default limits.
    #[cfg(test)]
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots: roots,
            max_read_chars: DEFAULT_MAX_READ_CHARS,
            max_list_entries: DEFAULT_MAX_LIST_ENTRIES,
            max_pdf_pages: DEFAULT_MAX_PDF_PAGES,
        }
    }

    fn require_roots(&self, context: &str) -> Result<(), ToolError> {
        if self.allowed_roots.is_empty() {
            return Err(ToolError::missing_config(format!(
                "LOCAL_FILE_ALLOWED_ROOTS is not configured; {context}"
            )));
        }
        Ok(())
    }
}

/// Split the `;`-separated roots value into absolute, normalized paths.
pub fn parse_allowed_roots(raw: &str) -> Vec<PathBuf> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| normalize_path(Path::new(item)))
        .collect()
}

// ─── Normalization & Containment ─────────────────────────────────────────────

/// Lexically normalize a path: make it absolute (against the current
/// directory if needed) and fold `.` / `..` components without hitting the
/// filesystem.
pub fn normalize_path(input: &Path) -> PathBuf {
    let absolute = if input.is_absolute() {
        input.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(input)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Case-folded comparison key. Windows paths compare case-insensitively;
/// everywhere else the path is used as-is.
fn compare_key(path: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(path.to_string_lossy().to_lowercase())
    } else {
        path.to_path_buf()
    }
}

/// Whether `target` equals `root` or is a path-segment descendant of it.
///
/// `Path::starts_with` compares whole components, so `/data/app2` is never
/// treated as contained in `/data/app`.
fn is_contained(target: &Path, root: &Path) -> bool {
    compare_key(target).starts_with(compare_key(root))
}

/// Verify `absolute_path` falls under one of the allowed roots.
///
/// Returns the normalized path together with the matching root. Violation is
/// `PATH_NOT_ALLOWED`; the path is never narrowed or rewritten to comply.
pub fn assert_path_allowed(
    absolute_path: &Path,
    policy: &LocalFilePolicy,
) -> Result<ResolvedPath, ToolError> {
    policy.require_roots("local file access denied")?;

    let target = normalize_path(absolute_path);
    for root in &policy.allowed_roots {
        if is_contained(&target, root) {
            return Ok(ResolvedPath {
                absolute_path: target,
                allowed_root: root.clone(),
            });
        }
    }

    Err(ToolError::with_details(
        ErrorCode::PathNotAllowed,
        format!("path is outside the allowed roots: {}", target.display()),
        json!({ "allowedRoots": roots_as_strings(policy) }),
    ))
}

/// A path that passed the containment check.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    pub absolute_path: PathBuf,
    pub allowed_root: PathBuf,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolve an input path for create-style operations (the target need not
/// exist). Absolute input is normalized; relative input resolves against the
/// first allowed root.
pub fn resolve_input_path(input: &str, policy: &LocalFilePolicy) -> Result<PathBuf, ToolError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ToolError::bad_request("path must not be empty"));
    }

    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        return Ok(normalize_path(candidate));
    }

    policy.require_roots("cannot resolve a relative path")?;
    Ok(normalize_path(&policy.allowed_roots[0].join(raw)))
}

/// Resolve and containment-check in one step (create-style).
pub fn resolve_and_assert(input: &str, policy: &LocalFilePolicy) -> Result<ResolvedPath, ToolError> {
    let absolute = resolve_input_path(input, policy)?;
    assert_path_allowed(&absolute, policy)
}

/// Resolve an input path for read-style operations: the target must exist.
///
/// Absolute input is containment-checked then stat'ed. Relative input is
/// tried against each allowed root in configured order; the first existing
/// candidate wins.
pub fn resolve_existing_path(
    input: &str,
    policy: &LocalFilePolicy,
) -> Result<ResolvedPath, ToolError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ToolError::bad_request("path must not be empty"));
    }

    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        let resolved = assert_path_allowed(candidate, policy)?;
        if !resolved.absolute_path.exists() {
            return Err(ToolError::not_found(format!("path does not exist: {raw}")));
        }
        return Ok(resolved);
    }

    policy.require_roots("cannot resolve a relative path")?;

    for root in &policy.allowed_roots {
        let joined = normalize_path(&root.join(raw));
        if joined.exists() {
            return Ok(ResolvedPath {
                absolute_path: joined,
                allowed_root: root.clone(),
            });
        }
    }

    Err(ToolError::with_details(
        ErrorCode::NotFound,
        format!("not found under any allowed root: {raw}"),
        json!({ "allowedRoots": roots_as_strings(policy) }),
    ))
}

/// Whether `path` is one of the allowed roots itself (used by deletion to
/// refuse removing a root).
pub fn is_allowed_root(path: &Path, policy: &LocalFilePolicy) -> bool {
    let target = compare_key(&normalize_path(path));
    policy
        .allowed_roots
        .iter()
        .any(|root| compare_key(root) == target)
}

pub fn roots_as_strings(policy: &LocalFilePolicy) -> Vec<String> {
    policy
        .allowed_roots
        .iter()
        .map(|root| root.display().to_string())
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
