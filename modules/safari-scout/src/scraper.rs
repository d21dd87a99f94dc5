use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use safari_common::{SafariError, ThreadRecord, ThreadUrl};

const USER_AGENT: &str = "pain-safari/0.1 (+thread research; contact via repository)";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Top-level comments kept per thread.
const MAX_COMMENTS: usize = 10;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

// --- WebSearcher trait ---

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

// --- DuckDuckGo (HTML endpoint, no key) ---

static DDG_RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("valid regex")
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

pub struct DuckDuckGoSearcher {
    client: reqwest::Client,
}

impl DuckDuckGoSearcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }
}

#[async_trait]
impl WebSearcher for DuckDuckGoSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "DuckDuckGo search");

        let resp = self
            .client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .send()
            .await
            .context("DuckDuckGo request failed")?;
        if !resp.status().is_success() {
            bail!("DuckDuckGo returned HTTP {}", resp.status());
        }
        let html = resp.text().await.context("Failed to read DuckDuckGo response")?;

        let results = parse_duckduckgo_html(&html, max_results);
        info!(query, count = results.len(), "DuckDuckGo search complete");
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Pull result links out of DuckDuckGo's HTML page, unwrapping its `uddg` redirects.
pub(crate) fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    DDG_RESULT_LINK
        .captures_iter(html)
        .filter_map(|cap| {
            let href = decode_entities(&cap[1]);
            let url = unwrap_redirect(&href)?;
            let title = decode_entities(&HTML_TAG.replace_all(&cap[2], ""));
            Some(SearchResult {
                url,
                title: title.trim().to_string(),
                snippet: String::new(),
            })
        })
        .take(max_results)
        .collect()
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;
    if parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?;
        if !resp.status().is_success() {
            bail!("Serper returned HTTP {}", resp.status());
        }

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let results: Vec<SearchResult> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(max_results)
            .map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        info!(query, count = results.len(), "Serper search complete");
        Ok(results)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

// --- ThreadScraper trait ---

#[async_trait]
pub trait ThreadScraper: Send + Sync {
    async fn fetch(&self, url: &ThreadUrl) -> Result<ThreadRecord>;
    fn name(&self) -> &str;
}

// --- Reddit (old.reddit.com JSON rendering) ---

pub struct RedditScraper {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct PostData {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    num_comments: u32,
}

#[derive(Debug, Default, Deserialize)]
struct CommentData {
    #[serde(default)]
    body: String,
}

impl RedditScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }
}

#[async_trait]
impl ThreadScraper for RedditScraper {
    async fn fetch(&self, url: &ThreadUrl) -> Result<ThreadRecord> {
        if !url.is_reddit() {
            return Err(SafariError::Scraping(format!("unsupported thread host: {}", url.host())).into());
        }
        let endpoint = format!("{}/.json", url.fetch_url());
        info!(url = %url, scraper = "reddit", "Fetching thread");

        let resp = self
            .client
            .get(&endpoint)
            .query(&[("limit", MAX_COMMENTS.to_string())])
            .send()
            .await
            .with_context(|| format!("Request failed for {endpoint}"))?;
        if !resp.status().is_success() {
            return Err(SafariError::Scraping(format!("HTTP {} for {endpoint}", resp.status())).into());
        }
        let listings: Vec<Listing> = resp
            .json()
            .await
            .with_context(|| format!("Unexpected thread JSON from {endpoint}"))?;

        parse_thread(url, listings)
    }

    fn name(&self) -> &str {
        "reddit"
    }
}

fn parse_thread(url: &ThreadUrl, listings: Vec<Listing>) -> Result<ThreadRecord> {
    let mut listings = listings.into_iter();
    let post = listings
        .next()
        .and_then(|l| l.data.children.into_iter().find(|t| t.kind == "t3"))
        .context("Thread JSON has no post")?;
    let post: PostData = serde_json::from_value(post.data).unwrap_or_else(|e| {
        warn!(url = %url, error = %e, "Malformed post fields, treating as empty");
        PostData::default()
    });

    let comments: Vec<String> = listings
        .next()
        .map(|l| l.data.children)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| t.kind == "t1")
        .filter_map(|t| serde_json::from_value::<CommentData>(t.data).ok())
        .map(|c| c.body)
        .filter(|b| !is_removed(b))
        .take(MAX_COMMENTS)
        .collect();

    let mut record = ThreadRecord::new(url.clone(), post.title)
        .with_body(if is_removed(&post.selftext) { String::new() } else { post.selftext })
        .with_comment_count(post.num_comments)
        .with_comments(comments);
    if let Some(at) = post.created_utc.and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0)) {
        record = record.published_at(at);
    }
    Ok(record)
}

fn is_removed(text: &str) -> bool {
    matches!(text.trim(), "" | "[deleted]" | "[removed]")
}
