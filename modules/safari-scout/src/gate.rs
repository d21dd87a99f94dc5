use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use safari_common::Verdict;

use crate::aspects::AspectScore;
use crate::judge::{JudgeRequest, Judgment, SemanticJudge};

/// How a thread left the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePath {
    /// Score under threshold; the judge was never called.
    GatedReject,
    /// The judge answered and its label was kept.
    Escalated,
    /// The judge errored, timed out or answered garbage.
    JudgeFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub path: GatePath,
    pub verdict: Verdict,
    pub judgment: Option<Judgment>,
    pub judge_error: Option<String>,
}

impl GateDecision {
    /// Resolve an escalation from the judge's outcome. Failures become WEAK.
    pub fn from_judge(outcome: Result<Judgment, String>) -> Self {
        match outcome {
            Ok(judgment) => Self {
                path: GatePath::Escalated,
                verdict: judgment.label.into(),
                judgment: Some(judgment),
                judge_error: None,
            },
            Err(error) => Self {
                path: GatePath::JudgeFailed,
                verdict: Verdict::WeakOpportunity,
                judgment: None,
                judge_error: Some(error),
            },
        }
    }

    pub fn rejected() -> Self {
        Self {
            path: GatePath::GatedReject,
            verdict: Verdict::NotOpportunity,
            judgment: None,
            judge_error: None,
        }
    }

    pub fn escalated(&self) -> bool {
        self.path != GatePath::GatedReject
    }
}

/// Threshold gate in front of the semantic judge.
pub struct ClassificationGate {
    threshold: f64,
    timeout: Duration,
    judge: Arc<dyn SemanticJudge>,
}

impl ClassificationGate {
    pub fn new(threshold: f64, timeout: Duration, judge: Arc<dyn SemanticJudge>) -> Self {
        Self {
            threshold,
            timeout,
            judge,
        }
    }

    pub fn should_escalate(&self, score: &AspectScore) -> bool {
        score.aspect_score >= self.threshold
    }

    /// Decide one thread. Calls the judge at most once and never fails.
    ///
    /// `request` is only built when the score clears the threshold.
    pub async fn classify(
        &self,
        score: &AspectScore,
        request: impl FnOnce() -> JudgeRequest,
    ) -> GateDecision {
        if !self.should_escalate(score) {
            return GateDecision::rejected();
        }

        let request = request();
        info!(
            url = %request.url,
            score = score.aspect_score,
            judge = self.judge.name(),
            "Escalating to judge"
        );

        let outcome = match tokio::time::timeout(self.timeout, self.judge.classify(&request)).await {
            Ok(Ok(judgment)) => Ok(judgment),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("judge timed out after {}s", self.timeout.as_secs_f64())),
        };

        let decision = GateDecision::from_judge(outcome);
        match &decision.judge_error {
            Some(error) => warn!(url = %request.url, error = error.as_str(), "Judge failed, defaulting to WEAK_OPPORTUNITY"),
            None => info!(url = %request.url, verdict = %decision.verdict, "Judge verdict"),
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{judge_request, FailingJudge, FixedJudge, SlowJudge};
    use safari_common::OpportunityLabel;

    fn score(value: f64) -> AspectScore {
        AspectScore {
            aspect_score: value,
            ..AspectScore::zero(1)
        }
    }

    fn gate(judge: Arc<dyn SemanticJudge>) -> ClassificationGate {
        ClassificationGate::new(0.5, Duration::from_secs(5), judge)
    }

    #[tokio::test]
    async fn below_threshold_never_calls_judge() {
        let judge = Arc::new(FixedJudge::new(OpportunityLabel::StrongOpportunity));
        let decision = gate(judge.clone()).classify(&score(0.3), judge_request).await;
        assert_eq!(decision.path, GatePath::GatedReject);
        assert_eq!(decision.verdict, Verdict::NotOpportunity);
        assert_eq!(judge.calls(), 0);
    }

    #[tokio::test]
    async fn above_threshold_calls_judge_exactly_once() {
        let judge = Arc::new(FixedJudge::new(OpportunityLabel::StrongOpportunity));
        let decision = gate(judge.clone()).classify(&score(0.7), judge_request).await;
        assert_eq!(decision.path, GatePath::Escalated);
        assert_eq!(decision.verdict, Verdict::StrongOpportunity);
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn score_equal_to_threshold_escalates() {
        let judge = Arc::new(FixedJudge::new(OpportunityLabel::NotOpportunity));
        let decision = gate(judge.clone()).classify(&score(0.5), judge_request).await;
        assert_eq!(decision.verdict, Verdict::NotOpportunity);
        assert!(decision.escalated());
        assert_eq!(judge.calls(), 1);
    }

    #[tokio::test]
    async fn judge_error_becomes_weak() {
        let decision = gate(Arc::new(FailingJudge))
            .classify(&score(0.9), judge_request)
            .await;
        assert_eq!(decision.path, GatePath::JudgeFailed);
        assert_eq!(decision.verdict, Verdict::WeakOpportunity);
        assert!(decision.judge_error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn judge_timeout_becomes_weak() {
        let gate = ClassificationGate::new(
            0.5,
            Duration::from_millis(20),
            Arc::new(SlowJudge::new(Duration::from_secs(5))),
        );
        let decision = gate.classify(&score(0.9), judge_request).await;
        assert_eq!(decision.verdict, Verdict::WeakOpportunity);
        assert!(decision.judge_error.unwrap().contains("timed out"));
    }

    #[test]
    fn decision_is_a_function_of_judge_outcome() {
        let weak = GateDecision::from_judge(Err("boom".into()));
        assert_eq!(weak, GateDecision::from_judge(Err("boom".into())));
        let strong = GateDecision::from_judge(Ok(Judgment::label_only(
            OpportunityLabel::StrongOpportunity,
        )));
        assert_eq!(strong.verdict, Verdict::StrongOpportunity);
        assert!(strong.judge_error.is_none());
    }
}
