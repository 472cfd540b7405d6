//! `web_search`: multi-backend search with ordered fallback.
//!
//! The `auto` chain tries keyless backends first (DuckDuckGo HTML, Bing
//! RSS), then keyed APIs (Tavily, SerpAPI). Each attempt runs under the
//! configured timeout; the first backend returning at least one result wins
//! and every failure records one reason. Pinning `SEARCH_PROVIDER` collapses
//! the chain to a single backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::RuntimeConfig;

use super::{clamped_limit, require_str, Args, ErrorCode, ToolError, ToolOutcome};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

// ─── Chain ───────────────────────────────────────────────────────────────────

type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<SearchItem>, String>> + Send + 'a>>;

pub struct ProviderAttempt<'a> {
    pub name: &'static str,
    pub run: ProviderFuture<'a>,
}

/// Run the attempts in order under a per-attempt timeout. Returns the first
/// non-empty result set, or one failure reason per attempted backend.
async fn run_chain<'a>(
    attempts: Vec<ProviderAttempt<'a>>,
    timeout: Duration,
) -> Result<(&'static str, Vec<SearchItem>), Vec<String>> {
    let mut errors = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let name = attempt.name;
        match tokio::time::timeout(timeout, attempt.run).await {
            Err(_) => errors.push(format!("{name}: timed out after {}ms", timeout.as_millis())),
            Ok(Err(reason)) => errors.push(format!("{name}: {reason}")),
            Ok(Ok(items)) if items.is_empty() => errors.push(format!("{name}: empty results")),
            Ok(Ok(items)) => {
                tracing::debug!(provider = name, count = items.len(), "search backend succeeded");
                return Ok((name, items));
            }
        }
    }
    Err(errors)
}

// ─── HTML / entity helpers ───────────────────────────────────────────────────

fn tag_stripper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

pub fn strip_tags(html: &str) -> String {
    tag_stripper().replace_all(html, "").trim().to_string()
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn clean_fragment(html: &str) -> String {
    decode_entities(&strip_tags(html))
}

/// Minimal percent-decoder for redirect query parameters.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).and_then(|h| {
                    std::str::from_utf8(h)
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 16).ok())
                });
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// DuckDuckGo links go through `//duckduckgo.com/l/?uddg=<encoded>`; unwrap
/// the real destination when present.
pub fn resolve_ddg_redirect(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let tail = &href[pos + 5..];
        let encoded = tail.split('&').next().unwrap_or(tail);
        let decoded = percent_decode(encoded);
        if decoded.starts_with("http") {
            return decoded;
        }
    }
    if let Some(stripped) = href.strip_prefix("//") {
        return format!("https://{stripped}");
    }
    href.to_string()
}

// ─── Backends ────────────────────────────────────────────────────────────────

fn ddg_anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
            .expect("valid regex")
    })
}

fn ddg_snippet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</a>"#)
            .expect("valid regex")
    })
}

pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchItem> {
    // pair each snippet with the anchor of its own result block, so a
    // skipped anchor never shifts the snippets of the results after it
    let anchors: Vec<regex::Captures> = ddg_anchor_re().captures_iter(html).collect();
    let mut items = Vec::new();
    for (i, c) in anchors.iter().enumerate() {
        if items.len() == max_results {
            break;
        }
        let url = resolve_ddg_redirect(&decode_entities(&c[1]));
        let title = clean_fragment(&c[2]);
        if title.is_empty() || !url.starts_with("http") {
            continue;
        }
        let block_start = c.get(0).map_or(0, |m| m.end());
        let block_end = anchors
            .get(i + 1)
            .and_then(|n| n.get(0))
            .map_or(html.len(), |m| m.start());
        let snippet = ddg_snippet_re()
            .captures(&html[block_start..block_end])
            .map(|s| clean_fragment(&s[1]))
            .unwrap_or_default();
        items.push(SearchItem { title, url, snippet });
    }
    items
}

async fn search_duckduckgo(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
) -> Result<Vec<SearchItem>, String> {
    let response = client
        .get("https://html.duckduckgo.com/html/")
        .query(&[("q", query)])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }
    let html = response.text().await.map_err(|e| e.to_string())?;
    Ok(parse_duckduckgo_html(&html, max_results))
}

fn rss_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<item>(.*?)</item>").expect("valid regex")
    })
}

fn rss_field(item: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = item.find(&open)? + open.len();
    let end = item[start..].find(&close)? + start;
    let raw = item[start..end]
        .trim()
        .trim_start_matches("<![CDATA[")
        .trim_end_matches("]]>");
    let cleaned = clean_fragment(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn parse_bing_rss(xml: &str, max_results: usize) -> Vec<SearchItem> {
    rss_item_re()
        .captures_iter(xml)
        .filter_map(|c| {
            let item = &c[1];
            let title = rss_field(item, "title")?;
            let url = rss_field(item, "link")?;
            if !url.starts_with("http") {
                return None;
            }
            Some(SearchItem {
                title,
                url,
                snippet: rss_field(item, "description").unwrap_or_default(),
            })
        })
        .take(max_results)
        .collect()
}

async fn search_bing_rss(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
) -> Result<Vec<SearchItem>, String> {
    let response = client
        .get("https://www.bing.com/search")
        .query(&[("q", query), ("format", "rss")])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }
    let xml = response.text().await.map_err(|e| e.to_string())?;
    Ok(parse_bing_rss(&xml, max_results))
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

async fn search_tavily(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
    api_key: Option<String>,
) -> Result<Vec<SearchItem>, String> {
    let api_key = api_key.ok_or("missing TAVILY_API_KEY")?;
    let response = client
        .post("https://api.tavily.com/search")
        .json(&json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results,
        }))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }
    let body: TavilyResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(body
        .results
        .into_iter()
        .take(max_results)
        .map(|r| SearchItem {
            title: r.title,
            url: r.url,
            snippet: r.content,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

async fn search_serpapi(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
    api_key: Option<String>,
) -> Result<Vec<SearchItem>, String> {
    let api_key = api_key.ok_or("missing SERPAPI_API_KEY")?;
    let response = client
        .get("https://serpapi.com/search.json")
        .query(&[
            ("engine", "google"),
            ("q", query),
            ("num", &max_results.to_string()),
            ("api_key", &api_key),
        ])
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("status {}", response.status()));
    }
    let body: SerpApiResponse = response.json().await.map_err(|e| e.to_string())?;
    Ok(body
        .organic_results
        .into_iter()
        .take(max_results)
        .map(|r| SearchItem {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
        })
        .collect())
}

// ─── Handler ─────────────────────────────────────────────────────────────────

const PROVIDER_NAMES: &[&str] = &["duckduckgo", "bing", "tavily", "serpapi"];

fn build_attempts<'a>(
    provider: &str,
    client: &'a reqwest::Client,
    query: &'a str,
    max_results: usize,
    config: &RuntimeConfig,
) -> Result<Vec<ProviderAttempt<'a>>, ToolError> {
    let tavily_key = config.get("TAVILY_API_KEY");
    let serpapi_key = config.get("SERPAPI_API_KEY");

    let make = move |name: &'static str| -> ProviderAttempt<'a> {
        let run: ProviderFuture<'a> = match name {
            "duckduckgo" => Box::pin(search_duckduckgo(client, query, max_results)),
            "bing" => Box::pin(search_bing_rss(client, query, max_results)),
            "tavily" => Box::pin(search_tavily(client, query, max_results, tavily_key.clone())),
            _ => Box::pin(search_serpapi(client, query, max_results, serpapi_key.clone())),
        };
        ProviderAttempt { name, run }
    };

    if provider == "auto" {
        return Ok(PROVIDER_NAMES.iter().copied().map(|n| make(n)).collect());
    }
    match PROVIDER_NAMES.iter().copied().find(|n| *n == provider) {
        Some(name) => Ok(vec![make(name)]),
        None => Err(ToolError::bad_request(format!(
            "unknown SEARCH_PROVIDER: {provider} (expected auto, duckduckgo, bing, tavily or serpapi)"
        ))),
    }
}

pub async fn web_search(args: &Args, config: &RuntimeConfig) -> Result<ToolOutcome, ToolError> {
    let query = require_str(args, "query")?;
    let max_results = clamped_limit(
        args,
        "max_results",
        config.search_default_max_results() as usize,
        10,
    );
    let timeout = Duration::from_millis(config.search_timeout_ms());
    let provider_setting = config.search_provider();

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ToolError::internal(format!("building http client: {e}")))?;

    let attempts = build_attempts(&provider_setting, &client, &query, max_results, config)?;
    match run_chain(attempts, timeout).await {
        Ok((provider, items)) => {
            let sources: Vec<serde_json::Value> = items
                .iter()
                .map(|i| json!({ "title": i.title, "url": i.url }))
                .collect();
            let text = format!(
                "Found {} result{} for \"{query}\" via {provider}",
                items.len(),
                if items.len() == 1 { "" } else { "s" }
            );
            Ok(ToolOutcome::new(
                text,
                json!({
                    "provider": provider,
                    "query": query,
                    "results": items,
                    "sources": sources,
                }),
            ))
        }
        Err(errors) => Err(ToolError::with_details(
            ErrorCode::UpstreamUnavailable,
            format!("all search backends failed for \"{query}\""),
            json!({ "errors": errors }),
        )),
    }
}
