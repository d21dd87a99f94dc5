use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ai_client::util::{json_payload, truncate_chars};
use ai_client::{ChatModel, Ollama};
use safari_common::{JudgeConfig, OpportunityLabel, RuntimeEnv, ThreadRecord, ThreadUrl};

use crate::aspects::AspectTally;

const BODY_EXCERPT_CHARS: usize = 1000;
const EVIDENCE_EXCERPT_CHARS: usize = 100;

const SEEKING_ALTERNATIVE: &str = "seeking_alternative";
const TOOL_COMPLAINT: &str = "tool_complaint";

// --- Request / response ---

/// Everything the judge sees about one escalated thread.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeRequest {
    pub industry: String,
    pub url: ThreadUrl,
    pub title: String,
    pub body_excerpt: String,
    /// Categories in first-seen order, with the configured description.
    pub aspects: Vec<JudgeAspect>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeAspect {
    pub category: String,
    pub description: String,
    pub count: usize,
    pub evidence: String,
}

impl JudgeRequest {
    pub fn new(
        industry: &str,
        record: &ThreadRecord,
        aspects: &[AspectTally],
        describe: impl Fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            industry: industry.to_string(),
            url: record.url.clone(),
            title: record.title.clone(),
            body_excerpt: truncate_chars(&record.body, BODY_EXCERPT_CHARS).to_string(),
            aspects: aspects
                .iter()
                .map(|t| JudgeAspect {
                    category: t.category.clone(),
                    description: describe(&t.category).unwrap_or_default(),
                    count: t.count,
                    evidence: t.evidence.clone(),
                })
                .collect(),
        }
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.aspects.iter().any(|a| a.category == name)
    }
}

/// A judge's answer for one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub label: OpportunityLabel,
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
    pub pain_type: Option<String>,
}

impl Judgment {
    pub fn label_only(label: OpportunityLabel) -> Self {
        Self {
            label,
            confidence: None,
            reasoning: None,
            pain_type: None,
        }
    }
}

// --- SemanticJudge trait ---

/// Semantic classification of an escalated thread. One call per thread, no retry.
#[async_trait]
pub trait SemanticJudge: Send + Sync {
    async fn classify(&self, request: &JudgeRequest) -> Result<Judgment>;
    fn name(&self) -> &str;
}

// --- LLM judge ---

const SYSTEM_PROMPT: &str = "You are a B2B SaaS market researcher. \
You read discussion threads and decide whether they reveal an unmet software need \
that a small company could build a product for. Respond with JSON only.";

/// Judge backed by a chat model in JSON mode.
pub struct LlmJudge {
    model: Arc<dyn ChatModel>,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    classification: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    pain_type: Option<String>,
}

impl LlmJudge {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Ollama-backed judge. `judge.base_url` wins over `OLLAMA_URL`.
    pub fn ollama(config: &JudgeConfig, env: &RuntimeEnv) -> Result<Self> {
        let base_url = config.base_url.as_deref().or(env.ollama_url.as_deref());
        let model = Ollama::new(
            config.model.clone(),
            base_url,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_temperature(config.temperature);
        info!(model = config.model.as_str(), base_url = model.base_url(), "Using Ollama judge");
        Ok(Self::new(Arc::new(model)))
    }
}

#[async_trait]
impl SemanticJudge for LlmJudge {
    async fn classify(&self, request: &JudgeRequest) -> Result<Judgment> {
        let prompt = build_prompt(request);
        debug!(url = %request.url, model = self.model.model_name(), "Judge request");

        let raw = self
            .model
            .complete_json(SYSTEM_PROMPT, &prompt)
            .await
            .context("Judge model call failed")?;
        parse_judgment(&raw)
    }

    fn name(&self) -> &str {
        self.model.model_name()
    }
}

pub(crate) fn build_prompt(request: &JudgeRequest) -> String {
    let aspects = if request.aspects.is_empty() {
        "- (none)".to_string()
    } else {
        request
            .aspects
            .iter()
            .map(|a| {
                format!(
                    "- {} ({}x): {}\n  Evidence: \"{}\"",
                    a.category,
                    a.count,
                    a.description,
                    truncate_chars(&a.evidence, EVIDENCE_EXCERPT_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Industry: {industry}\n\
         Thread title: {title}\n\
         Thread body (excerpt):\n{body}\n\n\
         Pain aspects detected by keyword analysis:\n{aspects}\n\n\
         Classify the thread:\n\
         - STRONG_OPPORTUNITY: a professional describes a recurring workflow problem, \
         current tools fail them, and they would pay for a better solution.\n\
         - WEAK_OPPORTUNITY: real friction, but vague, niche, or already well served.\n\
         - NOT_OPPORTUNITY: venting, career talk, jokes, or no software angle.\n\n\
         Respond with JSON: {{\"classification\": \"STRONG_OPPORTUNITY|WEAK_OPPORTUNITY|NOT_OPPORTUNITY\", \
         \"confidence\": 0.0-1.0, \"reasoning\": \"one sentence\", \"pain_type\": \"short label\"}}",
        industry = request.industry,
        title = request.title,
        body = if request.body_excerpt.trim().is_empty() {
            "(empty)"
        } else {
            request.body_excerpt.as_str()
        },
    )
}

pub(crate) fn parse_judgment(raw: &str) -> Result<Judgment> {
    let response: JudgeResponse = serde_json::from_str(json_payload(raw))
        .with_context(|| format!("Malformed judge response: {}", truncate_chars(raw, 200)))?;
    let label: OpportunityLabel = response.classification.parse()?;
    Ok(Judgment {
        label,
        confidence: response.confidence.map(|c| c.clamp(0.0, 1.0)),
        reasoning: response.reasoning.filter(|r| !r.trim().is_empty()),
        pain_type: response.pain_type.filter(|p| !p.trim().is_empty()),
    })
}

// --- Heuristic judge ---

/// Offline judge working from the extracted categories alone.
pub struct HeuristicJudge;

#[async_trait]
impl SemanticJudge for HeuristicJudge {
    async fn classify(&self, request: &JudgeRequest) -> Result<Judgment> {
        let seeking = request.has_category(SEEKING_ALTERNATIVE);
        let complaint = request.has_category(TOOL_COMPLAINT);
        let label = match (seeking, complaint) {
            (true, true) => OpportunityLabel::StrongOpportunity,
            (true, false) | (false, true) => OpportunityLabel::WeakOpportunity,
            (false, false) => OpportunityLabel::NotOpportunity,
        };
        Ok(Judgment {
            label,
            confidence: None,
            reasoning: Some("Keyword rule: seeking an alternative and/or complaining about a tool".into()),
            pain_type: None,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
