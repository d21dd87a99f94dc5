// Test mocks for the safari pipeline.
//
// One mock per trait boundary:
// - MockSearcher (WebSearcher): query → result URLs, records every call
// - MockScraper (ThreadScraper): canonical URL → ThreadRecord, counts fetches
// - FixedJudge / FailingJudge / SlowJudge (SemanticJudge)
//
// Plus helpers for configs, thread records and judge requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use safari_common::{OpportunityLabel, SafariConfig, ThreadRecord, ThreadUrl};

use crate::judge::{JudgeRequest, Judgment, SemanticJudge};
use crate::pipeline::{RunOptions, Safari, SafariDeps, SafariReport};
use crate::scraper::{SearchResult, ThreadScraper, WebSearcher};

/// The configuration shipped with the binary.
pub const SHIPPED_CONFIG: &str = include_str!("../../../config/safari.toml");

/// Shipped configuration with the politeness delay removed.
pub fn test_config() -> SafariConfig {
    let mut config = SafariConfig::from_toml_str(SHIPPED_CONFIG).expect("shipped config is valid");
    config.scrape_delay_ms = 0;
    config
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Query-keyed search results. Unregistered queries return no results
/// unless `.on_any()` set a default.
pub struct MockSearcher {
    results: HashMap<String, Vec<String>>,
    failures: Vec<String>,
    default: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failures: Vec::new(),
            default: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Results for every query not registered with `.on_query()`.
    pub fn on_any(mut self, urls: &[&str]) -> Self {
        self.default = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn fail_query(mut self, query: &str) -> Self {
        self.failures.push(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failures.iter().any(|q| q == query) {
            bail!("MockSearcher: search engine unavailable for {query}");
        }
        let urls = self.results.get(query).unwrap_or(&self.default);
        Ok(urls
            .iter()
            .take(max_results)
            .map(|url| SearchResult {
                url: url.clone(),
                title: String::new(),
                snippet: String::new(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// Canonical-URL keyed threads. Returns `Err` for unregistered URLs.
pub struct MockScraper {
    threads: HashMap<ThreadUrl, ThreadRecord>,
    fetches: Mutex<Vec<ThreadUrl>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self {
            threads: HashMap::new(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn on_thread(mut self, record: ThreadRecord) -> Self {
        self.threads.insert(record.url.clone(), record);
        self
    }

    pub fn fetches(&self) -> Vec<ThreadUrl> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        let url = ThreadUrl::parse(url).unwrap();
        self.fetches.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

impl Default for MockScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThreadScraper for MockScraper {
    async fn fetch(&self, url: &ThreadUrl) -> Result<ThreadRecord> {
        self.fetches.lock().unwrap().push(url.clone());
        self.threads
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockScraper: no thread registered for {url}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Judges
// ---------------------------------------------------------------------------

/// Always answers with the same label. Counts calls.
pub struct FixedJudge {
    label: OpportunityLabel,
    calls: AtomicUsize,
}

impl FixedJudge {
    pub fn new(label: OpportunityLabel) -> Self {
        Self {
            label,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemanticJudge for FixedJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<Judgment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Judgment::label_only(self.label))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Always errors, like an unreachable model server.
pub struct FailingJudge;

#[async_trait]
impl SemanticJudge for FailingJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<Judgment> {
        bail!("model server unavailable")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Answers STRONG after a delay. Used to trip the gate's timeout.
pub struct SlowJudge {
    delay: Duration,
}

impl SlowJudge {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SemanticJudge for SlowJudge {
    async fn classify(&self, _request: &JudgeRequest) -> Result<Judgment> {
        tokio::time::sleep(self.delay).await;
        Ok(Judgment::label_only(OpportunityLabel::StrongOpportunity))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn url(raw: &str) -> ThreadUrl {
    ThreadUrl::parse(raw).unwrap()
}

/// An eligible thread: enough comments, published recently.
pub fn thread(raw_url: &str, title: &str, body: &str) -> ThreadRecord {
    ThreadRecord::new(url(raw_url), title)
        .with_body(body)
        .with_comment_count(12)
        .published_at(recent())
}

/// A thread that should never clear the gate.
pub fn bland_thread(raw_url: &str) -> ThreadRecord {
    thread(
        raw_url,
        "Weekly discussion",
        "Share what you worked on this week. Photos welcome.",
    )
}

/// The canonical pain thread: a tool complaint plus a request for an alternative.
pub fn pain_thread(raw_url: &str) -> ThreadRecord {
    thread(
        raw_url,
        "Excel is crashing constantly, is there an app for reconciling invoices?",
        "",
    )
}

pub fn recent() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(30)
}

pub fn judge_request() -> JudgeRequest {
    JudgeRequest::new("accountants", &pain_thread("https://reddit.com/r/accounting/1"), &[], |_| None)
}

pub fn options(industry: &str, limit: usize) -> RunOptions {
    RunOptions {
        industry: industry.to_string(),
        limit,
    }
}

/// Run the full pipeline against mocks.
pub async fn run_safari(
    config: SafariConfig,
    searcher: Arc<MockSearcher>,
    scraper: Arc<MockScraper>,
    judge: Arc<dyn SemanticJudge>,
    options: &RunOptions,
) -> SafariReport {
    let deps = SafariDeps::builder()
        .searcher(searcher)
        .scraper(scraper)
        .judge(judge)
        .build();
    Safari::new(Arc::new(config), deps)
        .expect("test config compiles")
        .run(options)
        .await
}
