//! `get_local_access_policy`: report the active filesystem policy.
//!
//! Unlike the filesystem operations, this tool succeeds with zero roots so
//! the model can explain an unconfigured setup instead of guessing.

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{Args, ToolError, ToolOutcome};

pub async fn get_local_access_policy(
    _args: &Args,
    config: &RuntimeConfig,
) -> Result<ToolOutcome, ToolError> {
    let policy = LocalFilePolicy::from_config(config);
    let roots = policy::roots_as_strings(&policy);
    let configured = !roots.is_empty();

    let text = if configured {
        format!(
            "Local file access is enabled for {} root{}",
            roots.len(),
            if roots.len() == 1 { "" } else { "s" }
        )
    } else {
        "Local file access is not configured (LOCAL_FILE_ALLOWED_ROOTS is empty)".to_string()
    };

    Ok(ToolOutcome::new(
        text,
        json!({
            "configured": configured,
            "allowedRoots": roots,
            "rootCount": policy.allowed_roots.len(),
            "limits": {
                "maxReadChars": policy.max_read_chars,
                "maxListEntries": policy.max_list_entries,
                "maxPdfPages": policy.max_pdf_pages,
            },
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_unconfigured_without_error() {
        let config = RuntimeConfig::from_pairs::<_, String, String>([]);
        let outcome = get_local_access_policy(&Args::new(), &config).await.unwrap();
        assert_eq!(outcome.data["configured"], false);
        assert_eq!(outcome.data["rootCount"], 0);
    }

    #[tokio::test]
    async fn test_reports_roots_and_limits() {
        let config = RuntimeConfig::from_pairs([
            ("LOCAL_FILE_ALLOWED_ROOTS", "/a;/b"),
            ("LOCAL_FILE_MAX_READ_CHARS", "600"),
        ]);
        let outcome = get_local_access_policy(&Args::new(), &config).await.unwrap();
        assert_eq!(outcome.data["configured"], true);
        assert_eq!(outcome.data["rootCount"], 2);
        assert_eq!(outcome.data["limits"]["maxReadChars"], 600);
    }
}
