//! `save_chat_answer` and `list_save_targets`: document-store tools.
//!
//! Registry-only: neither is offered to the model; the host application
//! invokes them directly when the user asks to keep an answer.

use chrono::Utc;
use serde_json::json;

use crate::config::RuntimeConfig;
use crate::docstore::{filter_targets, DocStoreClient, PageRef};

use super::{optional_str, require_str, Args, ToolError, ToolOutcome};

fn docstore_from_config(config: &RuntimeConfig) -> Result<DocStoreClient, ToolError> {
    let api_key = config
        .get("NOTION_API_KEY")
        .ok_or_else(|| ToolError::missing_config("NOTION_API_KEY is not configured"))?;
    DocStoreClient::new(api_key)
}

fn parent_page_id(args: &Args, config: &RuntimeConfig) -> Result<String, ToolError> {
    optional_str(args, "parent_page_id")
        .or_else(|| config.get("NOTION_PARENT_PAGE_ID"))
        .ok_or_else(|| {
            ToolError::missing_config(
                "no save destination: pass parent_page_id or configure NOTION_PARENT_PAGE_ID",
            )
        })
}

pub fn default_title() -> String {
    format!("Chat answer {}", Utc::now().format("%Y-%m-%d %H:%M"))
}

pub async fn save_chat_answer(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let answer = require_str(args, "answer")?;
    let title = optional_str(args, "title").unwrap_or_else(default_title);

    let store = docstore_from_config(config)?;
    let parent = parent_page_id(args, config)?;

    let page = store.create_page(&parent, &title, &answer).await?;
    tracing::info!(page_id = %page.id, "saved chat answer");

    Ok(ToolOutcome::new(
        format!("Saved \"{title}\""),
        json!({
            "pageId": page.id,
            "url": page.url,
            "title": title,
            "parentPageId": parent,
        }),
    ))
}

pub async fn list_save_targets(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let query = optional_str(args, "query");

    let store = docstore_from_config(config)?;
    let parent = parent_page_id(args, config)?;

    let mut targets = vec![PageRef {
        id: parent.clone(),
        title: "Default destination".to_string(),
    }];
    targets.extend(store.list_child_pages(&parent).await?);
    let targets = filter_targets(targets, query.as_deref());

    let items: Vec<serde_json::Value> = targets
        .iter()
        .map(|t| json!({ "id": t.id, "title": t.title }))
        .collect();

    Ok(ToolOutcome::new(
        format!(
            "{} save target{} available",
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        ),
        json!({ "targets": items }),
    ))
}
