use serde::Serialize;

use safari_common::Verdict;

use crate::discovery::{FallbackDecision, StrategyYield};
use crate::gate::GatePath;

use super::outcome::{Disposition, ThreadOutcome};

/// Stats from a safari run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SafariStats {
    pub queries_run: u32,
    pub queries_failed: u32,
    pub urls_discovered: u32,
    /// Search results dropped because they were not usable URLs.
    pub invalid_urls: u32,
    /// `None` when the run stopped before fallback was considered.
    pub fallback: Option<FallbackDecision>,
    pub threads_processed: u32,
    pub unscored: u32,
    pub ineligible: u32,
    pub gated_rejects: u32,
    pub escalated: u32,
    pub judge_failures: u32,
    pub strong: u32,
    pub weak: u32,
    pub not_opportunity: u32,
    pub stopped_early: bool,
}

impl SafariStats {
    pub fn record_yield(&mut self, y: &StrategyYield) {
        self.queries_run += y.queries_run as u32;
        self.queries_failed += y.queries_failed as u32;
        self.urls_discovered += y.urls.len() as u32;
    }

    pub fn record(&mut self, outcome: &ThreadOutcome) {
        self.threads_processed += 1;
        match &outcome.disposition {
            Disposition::Unscored { .. } => self.unscored += 1,
            Disposition::Ineligible { .. } => self.ineligible += 1,
            Disposition::Gated(decision) => match decision.path {
                GatePath::GatedReject => self.gated_rejects += 1,
                GatePath::Escalated => self.escalated += 1,
                GatePath::JudgeFailed => {
                    self.escalated += 1;
                    self.judge_failures += 1;
                }
            },
        }
        match outcome.verdict {
            Verdict::StrongOpportunity => self.strong += 1,
            Verdict::WeakOpportunity => self.weak += 1,
            Verdict::NotOpportunity => self.not_opportunity += 1,
            Verdict::Unscored => {}
        }
    }

    /// Threads that received a verdict other than UNSCORED.
    pub fn classified(&self) -> u32 {
        self.threads_processed - self.unscored
    }
}

impl std::fmt::Display for SafariStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Safari Run Complete ===")?;
        writeln!(f, "Queries run:        {}", self.queries_run)?;
        writeln!(f, "Queries failed:     {}", self.queries_failed)?;
        writeln!(f, "URLs discovered:    {}", self.urls_discovered)?;
        writeln!(f, "Invalid results:    {}", self.invalid_urls)?;
        let fallback = match self.fallback {
            Some(FallbackDecision::Fired) => "fired",
            Some(FallbackDecision::SkippedReducedScope) => "skipped (reduced scope)",
            Some(FallbackDecision::SkippedSufficientYield) => "skipped (enough results)",
            None => "not evaluated",
        };
        writeln!(f, "Fallback:           {fallback}")?;
        writeln!(f, "Threads processed:  {}", self.threads_processed)?;
        writeln!(f, "  Classified:       {}", self.classified())?;
        writeln!(f, "  Unscored:         {}", self.unscored)?;
        writeln!(f, "\nGate:")?;
        writeln!(f, "  Ineligible:       {}", self.ineligible)?;
        writeln!(f, "  Below threshold:  {}", self.gated_rejects)?;
        writeln!(f, "  Escalated:        {}", self.escalated)?;
        writeln!(f, "  Judge failures:   {}", self.judge_failures)?;
        writeln!(f, "\nVerdicts:")?;
        writeln!(f, "  Strong: {}", self.strong)?;
        writeln!(f, "  Weak:   {}", self.weak)?;
        writeln!(f, "  Not:    {}", self.not_opportunity)?;
        if self.stopped_early {
            writeln!(f, "\nStopped early on request.")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Strategy;
    use safari_common::ThreadUrl;

    #[test]
    fn unscored_counts_separately_from_classified() {
        let mut stats = SafariStats::default();
        let url = ThreadUrl::parse("https://reddit.com/r/x/1").unwrap();
        stats.record(&ThreadOutcome::unscored(url, Strategy::Primary, "HTTP 500"));
        assert_eq!(stats.threads_processed, 1);
        assert_eq!(stats.unscored, 1);
        assert_eq!(stats.classified(), 0);

        let text = stats.to_string();
        assert!(text.contains("Unscored:         1"));
        assert!(text.contains("Fallback:           not evaluated"));
    }
}
