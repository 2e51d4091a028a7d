//! Web tools: `web_fetch` and `web_search`.
//!
//! `web_fetch` performs an HTTP GET through the tool-proxy retry policy and
//! returns a short header block followed by readable content: HTML reduced
//! to text with links kept, JSON pretty-printed, anything else verbatim.
//! `web_search` queries the Brave Search API through the same policy.
//! Both share one HTTP client, a [`LazyService`] built on first use.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LoopError, Result};
use crate::providers::{execute_with_retry, parse_provider_error, RetryPolicy};
use crate::utils::string::{format_thousands, prefix_chars};

use super::{LazyService, Tool, ToolContext};

const WEB_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_MAX_FETCH_CHARS: usize = 50_000;
const MIN_FETCH_CHARS: usize = 256;
/// Maximum bytes read from a response body.
const MAX_FETCH_BYTES: usize = 2_000_000;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_SEARCH_COUNT: u64 = 5;
const MAX_SEARCH_COUNT: u64 = 20;
const MAX_QUERY_CHARS: usize = 400;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static INVISIBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|head|noscript)[^>]*>.*?</(script|style|head|noscript)>")
        .expect("valid regex")
});
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).expect("valid regex")
});
static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|tr|h[1-6]|blockquote)\b[^>]*>").expect("valid regex")
});
static LI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid regex"));
static CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(td|th)\s*>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{3,}").expect("valid regex"));
static TRAILING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));
static NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Build the shared browser-like HTTP client used by web tools.
pub fn http_client_service() -> Arc<LazyService<Client>> {
    Arc::new(LazyService::new("http_client", || async {
        Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(FETCH_TIMEOUT)
            .user_agent(WEB_USER_AGENT)
            .build()
            .map_err(|e| LoopError::Tool(format!("Failed to build HTTP client: {}", e)))
    }))
}

/// Web fetch tool for URL content retrieval.
pub struct WebFetchTool {
    client: Arc<LazyService<Client>>,
    retry: RetryPolicy,
    allow_private_hosts: bool,
}

impl WebFetchTool {
    /// Create a fetch tool on top of a shared client.
    pub fn new(client: Arc<LazyService<Client>>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            allow_private_hosts: false,
        }
    }

    /// Permit loopback and private-network hosts.
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    async fn get(&self, url: &Url, ctx: &ToolContext) -> Result<reqwest::Response> {
        let client = self.client.get().await?;
        execute_with_retry(&self.retry, "web_fetch", &ctx.cancel, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client
                    .get(url)
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .send()
                    .await?;
                let status = response.status();
                if status.as_u16() == 429 {
                    return Err(LoopError::from(parse_provider_error(
                        429,
                        &format!("HTTP 429 fetching {}", response.url()),
                    )));
                }
                Ok(response)
            }
        })
        .await
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL and return it as readable text. \
         Supports HTML pages (converted to plain text with links preserved), \
         JSON APIs (pretty-printed), and plain text. GET requests only."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The HTTP or HTTPS URL to fetch"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters of content to return (default 50000)",
                    "minimum": MIN_FETCH_CHARS
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoopError::Tool("Missing 'url' parameter".to_string()))?;

        let parsed = Url::parse(url)
            .map_err(|e| LoopError::Tool(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LoopError::Tool(
                "URL must use http or https scheme".to_string(),
            ));
        }
        if !self.allow_private_hosts && is_blocked_host(&parsed) {
            return Err(LoopError::SecurityViolation(
                "Blocked URL host (local or private network)".to_string(),
            ));
        }

        let max_chars = args
            .get("max_chars")
            .and_then(|v| v.as_u64())
            .map(|v| (v as usize).max(MIN_FETCH_CHARS))
            .unwrap_or(DEFAULT_MAX_FETCH_CHARS);

        let response = self.get(&parsed, ctx).await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(LoopError::Tool(format!(
                "HTTP {} fetching {}",
                status.as_u16(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = read_body_limited(response, MAX_FETCH_BYTES).await?;

        let (title, content) = if content_type.contains("text/html")
            || content_type.contains("application/xhtml")
        {
            (extract_title(&body), html_to_text(&body))
        } else if content_type.contains("application/json") {
            let pretty = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or(body);
            (None, pretty)
        } else {
            (None, body)
        };

        Ok(render_fetch(FetchReport {
            url,
            final_url: &final_url,
            status: status.as_u16(),
            content_type: &content_type,
            title: title.as_deref(),
            content: &content,
            max_chars,
        }))
    }
}

struct FetchReport<'a> {
    url: &'a str,
    final_url: &'a str,
    status: u16,
    content_type: &'a str,
    title: Option<&'a str>,
    content: &'a str,
    max_chars: usize,
}

fn render_fetch(report: FetchReport<'_>) -> String {
    let original = report.content.chars().count();
    let truncated = original > report.max_chars;

    let mut parts = vec![format!("URL: {}", report.url)];
    if report.final_url != report.url {
        parts.push(format!("Final URL: {}", report.final_url));
    }
    parts.push(format!("Status: {}", report.status));
    parts.push(format!("Content-Type: {}", report.content_type));
    if let Some(title) = report.title.filter(|t| !t.is_empty()) {
        parts.push(format!("Title: {}", title));
    }
    parts.push(if truncated {
        format!(
            "Length: {} chars (truncated from {})",
            format_thousands(report.max_chars),
            format_thousands(original)
        )
    } else {
        format!("Length: {} chars", format_thousands(original))
    });
    parts.push(String::new());
    parts.push("--- Content ---".to_string());
    parts.push(String::new());
    if truncated {
        parts.push(prefix_chars(report.content, report.max_chars));
        parts.push(String::new());
        parts.push(format!(
            "[Content truncated at {} characters]",
            format_thousands(report.max_chars)
        ));
    } else {
        parts.push(report.content.to_string());
    }
    parts.join("\n")
}

fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = decode_common_html_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(title)
}

/// Reduce an HTML document to readable plain text.
pub fn html_to_text(html: &str) -> String {
    let text = INVISIBLE_RE.replace_all(html, "");
    let text = LINK_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        let href = &caps[1];
        let label = TAG_RE.replace_all(&caps[2], "");
        let label = label.trim();
        if label.is_empty() {
            href.to_string()
        } else {
            format!("{} ({})", label, href)
        }
    });
    let text = BR_RE.replace_all(&text, "\n");
    let text = LI_RE.replace_all(&text, "\n- ");
    let text = BLOCK_RE.replace_all(&text, "\n");
    let text = CELL_RE.replace_all(&text, "\t");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_common_html_entities(&text).replace('\t', "  ");
    let text = SPACES_RE.replace_all(&text, "  ");
    let text = TRAILING_RE.replace_all(&text, "\n");
    let text = NEWLINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn decode_common_html_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Read a response body in chunks, stopping at `max_bytes`.
async fn read_body_limited(mut response: reqwest::Response, max_bytes: usize) -> Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| LoopError::Tool(format!("Failed to read response body: {}", e)))?
    {
        let take = chunk.len().min(max_bytes.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= max_bytes {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn is_blocked_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return true;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => is_private_v4(v4),
        Ok(IpAddr::V6(v6)) => is_private_v6(v6),
        Err(_) => false,
    }
}

fn is_private_v4(addr: Ipv4Addr) -> bool {
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
}

fn is_private_v6(addr: Ipv6Addr) -> bool {
    addr.is_loopback()
        || addr.is_unspecified()
        || (addr.segments()[0] & 0xfe00) == 0xfc00
        || (addr.segments()[0] & 0xffc0) == 0xfe80
}

/// Web search tool backed by the Brave Search API.
pub struct WebSearchTool {
    client: Arc<LazyService<Client>>,
    api_key: String,
    api_url: String,
    retry: RetryPolicy,
}

impl WebSearchTool {
    /// Create a search tool on top of a shared client.
    pub fn new(client: Arc<LazyService<Client>>, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            api_url: BRAVE_API_URL.to_string(),
            retry,
        }
    }

    /// Send queries to another endpoint.
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    async fn search(&self, query: &str, count: u64, ctx: &ToolContext) -> Result<BraveResponse> {
        let client = self.client.get().await?;
        let count = count.to_string();
        let count = count.as_str();
        let response = execute_with_retry(&self.retry, "web_search", &ctx.cancel, || {
            let client = Arc::clone(&client);
            async move {
                let response = client
                    .get(&self.api_url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .header("X-Subscription-Token", &self.api_key)
                    .query(&[("q", query), ("count", count)])
                    .send()
                    .await?;
                if response.status().as_u16() == 429 {
                    return Err(LoopError::from(parse_provider_error(
                        429,
                        "HTTP 429 from Brave Search API",
                    )));
                }
                Ok(response)
            }
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoopError::Tool(format!(
                "HTTP {} from Brave Search API",
                status.as_u16()
            )));
        }
        response
            .json::<BraveResponse>()
            .await
            .map_err(|e| LoopError::Tool(format!("Failed to parse search response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    description: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, URLs and snippets. \
         Use web_fetch to read a result in full."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results (default 5)",
                    "minimum": 1,
                    "maximum": MAX_SEARCH_COUNT
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoopError::Tool("Missing 'query' parameter".to_string()))?;
        let query = prefix_chars(query, MAX_QUERY_CHARS);
        let count = args
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_SEARCH_COUNT)
            .clamp(1, MAX_SEARCH_COUNT);

        let response = self.search(&query, count, ctx).await?;
        let results = response.web.map(|w| w.results).unwrap_or_default();
        Ok(render_search(&query, &results))
    }
}

fn render_search(query: &str, results: &[BraveResult]) -> String {
    if results.is_empty() {
        return format!("No results found for: {}", query);
    }

    let mut out = format!("Search: \"{}\"\nResults: {}\n", query, results.len());
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n   {}\n", i + 1, result.title, result.url));
        if let Some(desc) = result.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("   {}\n", desc));
        }
    }
    out
}
