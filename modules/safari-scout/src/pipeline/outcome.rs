use serde::Serialize;

use safari_common::{ThreadRecord, ThreadUrl, Verdict};

use crate::aspects::{AspectScore, AspectTally};
use crate::discovery::Strategy;
use crate::gate::GateDecision;

use super::stats::SafariStats;

/// How a thread's verdict was reached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Scrape failed; the thread was never evaluated.
    Unscored { reason: String },
    /// Fetched but outside the comment/age window. No judge call.
    Ineligible { reason: String },
    Gated(GateDecision),
}

/// What the pipeline learned about a fetched thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub record: ThreadRecord,
    pub score: AspectScore,
    pub aspects: Vec<AspectTally>,
}

/// One row of the run result, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadOutcome {
    pub url: ThreadUrl,
    pub strategy: Strategy,
    pub verdict: Verdict,
    pub disposition: Disposition,
    pub assessment: Option<Assessment>,
}

impl ThreadOutcome {
    pub fn unscored(url: ThreadUrl, strategy: Strategy, reason: impl Into<String>) -> Self {
        Self {
            url,
            strategy,
            verdict: Verdict::Unscored,
            disposition: Disposition::Unscored {
                reason: reason.into(),
            },
            assessment: None,
        }
    }

    pub fn ineligible(strategy: Strategy, assessment: Assessment, reason: String) -> Self {
        Self {
            url: assessment.record.url.clone(),
            strategy,
            verdict: Verdict::NotOpportunity,
            disposition: Disposition::Ineligible { reason },
            assessment: Some(assessment),
        }
    }

    pub fn gated(strategy: Strategy, assessment: Assessment, decision: GateDecision) -> Self {
        Self {
            url: assessment.record.url.clone(),
            strategy,
            verdict: decision.verdict,
            disposition: Disposition::Gated(decision),
            assessment: Some(assessment),
        }
    }

    pub fn aspect_score(&self) -> f64 {
        self.assessment
            .as_ref()
            .map(|a| a.score.aspect_score)
            .unwrap_or(0.0)
    }

    pub fn title(&self) -> Option<&str> {
        self.assessment.as_ref().map(|a| a.record.title.as_str())
    }

    pub fn gate_decision(&self) -> Option<&GateDecision> {
        match &self.disposition {
            Disposition::Gated(decision) => Some(decision),
            _ => None,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SafariReport {
    pub run_id: String,
    pub industry: String,
    pub queries: Vec<String>,
    pub outcomes: Vec<ThreadOutcome>,
    pub stats: SafariStats,
}

impl SafariReport {
    /// Outcomes best first: by verdict, then by aspect score. Ties keep discovery order.
    pub fn ranked(&self) -> Vec<&ThreadOutcome> {
        let mut ranked: Vec<&ThreadOutcome> = self.outcomes.iter().collect();
        ranked.sort_by(|a, b| {
            a.verdict
                .rank()
                .cmp(&b.verdict.rank())
                .then_with(|| b.aspect_score().total_cmp(&a.aspect_score()))
        });
        ranked
    }
}
