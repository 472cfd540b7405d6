//! Document-store boundary: a thin Notion REST client.
//!
//! Only the two calls the save tools need are implemented: create a page
//! under a parent, and list a parent's child pages. Destination formatting
//! beyond title-plus-paragraphs is out of scope.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::{ErrorCode, ToolError};

const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps rich-text content at 2000 chars per block.
pub const MAX_PARAGRAPH_CHARS: usize = 2_000;

/// Split body text into paragraph-sized chunks on char boundaries.
pub fn paragraph_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if current.chars().count() >= MAX_PARAGRAPH_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPage {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRef {
    pub id: String,
    pub title: String,
}

pub struct DocStoreClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DocStoreClient {
    pub fn new(api_key: String) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ToolError::internal(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    fn upstream(stage: &str, e: reqwest::Error) -> ToolError {
        let code = if e.is_timeout() || e.is_connect() {
            ErrorCode::UpstreamNetworkError
        } else {
            ErrorCode::UpstreamError
        };
        ToolError::new(code, format!("{stage}: {e}"))
    }

    async fn check_status(response: reqwest::Response, stage: &str) -> Result<reqwest::Response, ToolError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ToolError::with_details(
            ErrorCode::UpstreamError,
            format!("{stage}: status {status}"),
            json!({ "body": body }),
        ))
    }

    /// Create a page with a title and paragraph children.
    pub async fn create_page(
        &self,
        parent_page_id: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPage, ToolError> {
        let children: Vec<Value> = paragraph_chunks(body)
            .into_iter()
            .map(|chunk| {
                json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": {
                        "rich_text": [{ "type": "text", "text": { "content": chunk } }]
                    }
                })
            })
            .collect();

        let response = self
            .http
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&json!({
                "parent": { "page_id": parent_page_id },
                "properties": {
                    "title": {
                        "title": [{ "type": "text", "text": { "content": title } }]
                    }
                },
                "children": children,
            }))
            .send()
            .await
            .map_err(|e| Self::upstream("creating page", e))?;

        Self::check_status(response, "creating page")
            .await?
            .json()
            .await
            .map_err(|e| Self::upstream("decoding created page", e))
    }

    /// List the child pages of a parent page.
    pub async fn list_child_pages(&self, parent_page_id: &str) -> Result<Vec<PageRef>, ToolError> {
        let response = self
            .http
            .get(format!(
                "{}/v1/blocks/{parent_page_id}/children?page_size=100",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| Self::upstream("listing child pages", e))?;

        let body: Value = Self::check_status(response, "listing child pages")
            .await?
            .json()
            .await
            .map_err(|e| Self::upstream("decoding child pages", e))?;

        let pages = body["results"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "child_page")
                    .filter_map(|b| {
                        Some(PageRef {
                            id: b["id"].as_str()?.to_string(),
                            title: b["child_page"]["title"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(pages)
    }
}

/// Case-insensitive title filter for target discovery.
pub fn filter_targets(targets: Vec<PageRef>, query: Option<&str>) -> Vec<PageRef> {
    match query {
        Some(q) if !q.trim().is_empty() => {
            let needle = q.trim().to_lowercase();
            targets
                .into_iter()
                .filter(|t| t.title.to_lowercase().contains(&needle))
                .collect()
        }
        _ => targets,
    }
}
