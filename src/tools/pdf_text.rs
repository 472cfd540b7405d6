//! `extract_pdf_text`: bounded PDF text extraction.

use std::path::Path;

use serde_json::json;

use crate::config::RuntimeConfig;

use super::policy::{self, LocalFilePolicy};
use super::{clamped_limit, require_str, Args, ErrorCode, ToolError, ToolOutcome};

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

pub async fn extract_pdf_text(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let input = require_str(args, "path")?;

    let policy = LocalFilePolicy::from_config(config);
    let max_pages = clamped_limit(args, "max_pages", policy.max_pdf_pages, policy.max_pdf_pages);

    let resolved = policy::resolve_existing_path(&input, &policy)?;
    let target = &resolved.absolute_path;
    if !has_pdf_extension(target) {
        return Err(ToolError::bad_request(format!(
            "not a .pdf file: {}",
            target.display()
        )));
    }

    let document = lopdf::Document::load(target).map_err(|e| {
        ToolError::new(
            ErrorCode::UnsupportedContent,
            format!("could not parse PDF {}: {e}", target.display()),
        )
    })?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let total_pages = page_numbers.len();
    let returned_pages = total_pages.min(max_pages);
    let truncated = total_pages > returned_pages;

    let mut pieces = Vec::with_capacity(returned_pages);
    for page in page_numbers.into_iter().take(returned_pages) {
        // a page that fails extraction is skipped rather than failing the call
        match document.extract_text(&[page]) {
            Ok(text) => pieces.push(text),
            Err(e) => {
                tracing::debug!(page, error = %e, "skipping unextractable page");
            }
        }
    }

    let text = pieces.join("\n").trim().to_string();
    if text.is_empty() {
        return Err(ToolError::new(
            ErrorCode::UnsupportedContent,
            format!(
                "no extractable text in the first {returned_pages} page(s) of {}",
                target.display()
            ),
        ));
    }

    Ok(ToolOutcome::new(
        format!(
            "Extracted text from {returned_pages} of {total_pages} page(s) of {}{}",
            target.display(),
            if truncated { " (truncated)" } else { "" }
        ),
        json!({
            "path": target.display().to_string(),
            "totalPages": total_pages,
            "returnedPages": returned_pages,
            "truncated": truncated,
            "text": text,
        }),
    ))
}
