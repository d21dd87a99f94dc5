use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SafariError;

// --- ThreadUrl ---

/// Hosts that all serve the same Reddit thread space.
const REDDIT_DOMAIN: &str = "reddit.com";

/// Reddit's legacy front end renders threads as plain server-side HTML/JSON.
const REDDIT_TEXT_HOST: &str = "old.reddit.com";

/// Canonical thread URL, the run-wide deduplication key.
///
/// Always `https`, lowercase, without query string, fragment or trailing
/// slash. Every Reddit subdomain collapses to `reddit.com`, so
/// `https://old.reddit.com/r/x/1` and `https://www.reddit.com/r/x/1/?utm=y`
/// are the same key. Reddit thread paths also end at the post id, dropping
/// the title slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThreadUrl(String);

impl ThreadUrl {
    pub fn parse(raw: &str) -> Result<Self, SafariError> {
        let invalid = |reason: String| SafariError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };

        let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_ascii_lowercase();

        let host = canonical_host(&host);
        let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
        let path = parsed.path().to_lowercase();
        let path = canonical_path(&host, path.trim_end_matches('/'));

        Ok(Self(format!("https://{host}{port}{path}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        let rest = self.0.trim_start_matches("https://");
        rest.split(['/', ':']).next().unwrap_or(rest)
    }

    pub fn is_reddit(&self) -> bool {
        self.host() == REDDIT_DOMAIN
    }

    /// The variant of this URL the scrape adapter should request.
    pub fn fetch_url(&self) -> String {
        if self.is_reddit() {
            let path = &self.0["https://".len() + REDDIT_DOMAIN.len()..];
            format!("https://{REDDIT_TEXT_HOST}{path}")
        } else {
            self.0.clone()
        }
    }
}

fn canonical_host(host: &str) -> String {
    if host == REDDIT_DOMAIN || host.ends_with(".reddit.com") {
        return REDDIT_DOMAIN.to_string();
    }
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Reddit thread paths end at the post id; the title slug after it is optional.
fn canonical_path<'p>(host: &str, path: &'p str) -> &'p str {
    if host != REDDIT_DOMAIN {
        return path;
    }
    let mut segments = path.match_indices('/').map(|(i, _)| i).chain([path.len()]);
    let mut prev = 0;
    let mut after_comments = false;
    for end in segments.by_ref() {
        let segment = &path[prev..end];
        if after_comments && segment.len() > 1 {
            return &path[..end];
        }
        after_comments = segment == "/comments";
        prev = end;
    }
    path
}

impl fmt::Display for ThreadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ThreadUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ThreadUrl {
    type Error = SafariError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ThreadUrl> for String {
    fn from(value: ThreadUrl) -> Self {
        value.0
    }
}

// --- ThreadRecord ---

/// One discussion thread as returned by the scrape adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub url: ThreadUrl,
    pub title: String,
    pub body: String,
    /// Top-level comments in page order.
    pub comments: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Total comments on the thread, which can exceed `comments.len()`.
    pub comment_count: u32,
}

/// Which part of a thread a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Title,
    Body,
    Comment(usize),
}

impl ThreadRecord {
    pub fn new(url: ThreadUrl, title: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            body: String::new(),
            comments: Vec::new(),
            published_at: None,
            comment_count: 0,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comment_count = self.comment_count.max(comments.len() as u32);
        self.comments = comments;
        self
    }

    pub fn with_comment_count(mut self, count: u32) -> Self {
        self.comment_count = count;
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Title, body, then comments, in reading order.
    pub fn text_fields(&self) -> impl Iterator<Item = (TextField, &str)> + '_ {
        [
            (TextField::Title, self.title.as_str()),
            (TextField::Body, self.body.as_str()),
        ]
        .into_iter()
        .chain(
            self.comments
                .iter()
                .enumerate()
                .map(|(i, c)| (TextField::Comment(i), c.as_str())),
        )
    }
}

// --- Verdicts ---

/// The three answers a semantic judge may give.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityLabel {
    StrongOpportunity,
    WeakOpportunity,
    NotOpportunity,
}

impl OpportunityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongOpportunity => "STRONG_OPPORTUNITY",
            Self::WeakOpportunity => "WEAK_OPPORTUNITY",
            Self::NotOpportunity => "NOT_OPPORTUNITY",
        }
    }
}

impl FromStr for OpportunityLabel {
    type Err = SafariError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "STRONG_OPPORTUNITY" | "STRONG" => Ok(Self::StrongOpportunity),
            "WEAK_OPPORTUNITY" | "WEAK" => Ok(Self::WeakOpportunity),
            "NOT_OPPORTUNITY" | "NOT" | "NONE" => Ok(Self::NotOpportunity),
            _ => Err(SafariError::Judge(format!("unknown label: {s}"))),
        }
    }
}

impl fmt::Display for OpportunityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final disposition of one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    StrongOpportunity,
    WeakOpportunity,
    NotOpportunity,
    /// Never evaluated: scraping or extraction failed upstream of the gate.
    Unscored,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongOpportunity => "STRONG_OPPORTUNITY",
            Self::WeakOpportunity => "WEAK_OPPORTUNITY",
            Self::NotOpportunity => "NOT_OPPORTUNITY",
            Self::Unscored => "UNSCORED",
        }
    }

    /// Sort key for report ranking, best first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::StrongOpportunity => 0,
            Self::WeakOpportunity => 1,
            Self::NotOpportunity => 2,
            Self::Unscored => 3,
        }
    }
}

impl From<OpportunityLabel> for Verdict {
    fn from(label: OpportunityLabel) -> Self {
        match label {
            OpportunityLabel::StrongOpportunity => Self::StrongOpportunity,
            OpportunityLabel::WeakOpportunity => Self::WeakOpportunity,
            OpportunityLabel::NotOpportunity => Self::NotOpportunity,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_variants_share_one_key() {
        let a = ThreadUrl::parse("https://reddit.com/r/x/1/").unwrap();
        let b = ThreadUrl::parse("https://old.reddit.com/r/x/1").unwrap();
        let c = ThreadUrl::parse("http://WWW.Reddit.com/r/X/1?utm_source=share#c").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "https://reddit.com/r/x/1");

        let slugged =
            ThreadUrl::parse("https://www.reddit.com/r/accounting/comments/abc123/excel_hell/").unwrap();
        let bare = ThreadUrl::parse("https://old.reddit.com/r/accounting/comments/abc123/").unwrap();
        let comment =
            ThreadUrl::parse("https://reddit.com/r/accounting/comments/abc123/excel_hell/kx9z1/")
                .unwrap();
        assert_eq!(slugged, bare);
        assert_eq!(slugged, comment);
        assert_eq!(slugged.as_str(), "https://reddit.com/r/accounting/comments/abc123");
    }

    #[test]
    fn slug_is_kept_off_reddit() {
        let url = ThreadUrl::parse("https://example.com/forum/comments/9/some_title").unwrap();
        assert_eq!(url.as_str(), "https://example.com/forum/comments/9/some_title");
    }

    #[test]
    fn fetch_url_targets_text_rendering() {
        let url = ThreadUrl::parse("https://www.reddit.com/r/Accounting/comments/abc/excel_hell/").unwrap();
        assert_eq!(
            url.fetch_url(),
            "https://old.reddit.com/r/accounting/comments/abc"
        );
    }

    #[test]
    fn other_hosts_drop_www_only() {
        let url = ThreadUrl::parse("https://www.example.com:8080/Forum/T/9/?page=2").unwrap();
        assert_eq!(url.as_str(), "https://example.com:8080/forum/t/9");
        assert_eq!(url.host(), "example.com");
        assert!(!url.is_reddit());
        assert_eq!(url.fetch_url(), url.as_str());
    }

    #[test]
    fn rejects_garbage_and_non_http() {
        assert!(ThreadUrl::parse("not a url").is_err());
        assert!(ThreadUrl::parse("ftp://reddit.com/r/x").is_err());
    }

    #[test]
    fn thread_url_round_trips_through_serde() {
        let url = ThreadUrl::parse("https://old.reddit.com/r/x/1").unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"https://reddit.com/r/x/1\"");
        let back: ThreadUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, url);
    }

    #[test]
    fn text_fields_in_reading_order() {
        let record = ThreadRecord::new(ThreadUrl::parse("https://reddit.com/r/x/1").unwrap(), "T")
            .with_body("B")
            .with_comments(vec!["c0".into(), "c1".into()]);
        let fields: Vec<_> = record.text_fields().collect();
        assert_eq!(
            fields,
            vec![
                (TextField::Title, "T"),
                (TextField::Body, "B"),
                (TextField::Comment(0), "c0"),
                (TextField::Comment(1), "c1"),
            ]
        );
        assert_eq!(record.comment_count, 2);
    }

    #[test]
    fn explicit_comment_count_is_kept() {
        let record = ThreadRecord::new(ThreadUrl::parse("https://reddit.com/r/x/1").unwrap(), "T")
            .with_comment_count(57)
            .with_comments(vec!["only one scraped".into()]);
        assert_eq!(record.comment_count, 57);
    }

    #[test]
    fn labels_parse_loosely() {
        assert_eq!(
            "strong_opportunity".parse::<OpportunityLabel>().unwrap(),
            OpportunityLabel::StrongOpportunity
        );
        assert_eq!(
            " Weak-Opportunity ".parse::<OpportunityLabel>().unwrap(),
            OpportunityLabel::WeakOpportunity
        );
        assert!("MAYBE".parse::<OpportunityLabel>().is_err());
    }

    #[test]
    fn verdict_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Verdict::Unscored).unwrap(),
            "\"UNSCORED\""
        );
        assert_eq!(
            Verdict::from(OpportunityLabel::NotOpportunity),
            Verdict::NotOpportunity
        );
    }
}
