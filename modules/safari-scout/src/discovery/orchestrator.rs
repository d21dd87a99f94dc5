use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use safari_common::{QueryConfig, ThreadUrl};

use super::queries::{pairwise_group, primary_group, QueryPlan, Strategy, StrategyGroup};
use crate::scraper::WebSearcher;

/// Every thread URL seen in the run, keyed canonically.
#[derive(Debug, Default)]
pub struct UrlLedger {
    seen: HashSet<ThreadUrl>,
    invalid: usize,
}

impl UrlLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize `raw` and record it. Returns the key only when it is new.
    pub fn admit(&mut self, raw: &str) -> Option<ThreadUrl> {
        match ThreadUrl::parse(raw) {
            Ok(url) => self.seen.insert(url.clone()).then_some(url),
            Err(e) => {
                debug!(url = raw, error = %e, "Dropping unusable search result");
                self.invalid += 1;
                None
            }
        }
    }

    /// Search results that could not be parsed as a thread URL.
    pub fn invalid(&self) -> usize {
        self.invalid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackDecision {
    Fired,
    SkippedReducedScope,
    SkippedSufficientYield,
}

/// Outcome of running one strategy group.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyYield {
    pub strategy: Strategy,
    /// Net-new canonical URLs, in discovery order.
    pub urls: Vec<ThreadUrl>,
    pub queries_run: usize,
    pub queries_failed: usize,
    pub results_seen: usize,
}

impl StrategyYield {
    fn empty(strategy: Strategy) -> Self {
        Self {
            strategy,
            urls: Vec::new(),
            queries_run: 0,
            queries_failed: 0,
            results_seen: 0,
        }
    }
}

/// Builds and runs the query plan against a search adapter.
pub struct QueryOrchestrator<'a> {
    config: &'a QueryConfig,
    searcher: &'a dyn WebSearcher,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(config: &'a QueryConfig, searcher: &'a dyn WebSearcher) -> Self {
        Self { config, searcher }
    }

    /// A fresh plan holding only the primary group.
    pub fn plan(&self, industry: &str) -> QueryPlan {
        QueryPlan::new(primary_group(self.config, industry))
    }

    /// Whether pairwise fallback should follow a primary yield of `primary_yield` new URLs.
    pub fn fallback_decision(&self, primary_yield: usize) -> FallbackDecision {
        if self.config.reduced_scope.enabled {
            FallbackDecision::SkippedReducedScope
        } else if primary_yield >= self.config.fallback_min_yield {
            FallbackDecision::SkippedSufficientYield
        } else {
            FallbackDecision::Fired
        }
    }

    /// Decide on fallback and, when it fires, append the pairwise group to `plan`.
    pub fn extend_with_fallback(
        &self,
        plan: &mut QueryPlan,
        industry: &str,
        primary_yield: usize,
    ) -> FallbackDecision {
        let decision = self.fallback_decision(primary_yield);
        info!(
            primary_yield,
            min_yield = self.config.fallback_min_yield,
            decision = ?decision,
            "Fallback decision"
        );
        if decision == FallbackDecision::Fired && !plan.has_fallback() {
            plan.attach_fallback(pairwise_group(self.config, industry));
        }
        decision
    }

    /// Run every query of `group` in order, admitting results into `ledger`.
    ///
    /// A failed query is logged and skipped. Running out of results is normal.
    pub async fn execute(&self, group: &StrategyGroup, ledger: &mut UrlLedger) -> StrategyYield {
        let mut out = StrategyYield::empty(group.strategy);

        for query in &group.queries {
            out.queries_run += 1;
            match self.searcher.search(&query.text, group.quota).await {
                Ok(results) => {
                    out.results_seen += results.len();
                    let before = out.urls.len();
                    out.urls
                        .extend(results.iter().filter_map(|r| ledger.admit(&r.url)));
                    info!(
                        query = query.text.as_str(),
                        results = results.len(),
                        new_urls = out.urls.len() - before,
                        "Query complete"
                    );
                }
                Err(e) => {
                    out.queries_failed += 1;
                    warn!(
                        query = query.text.as_str(),
                        searcher = self.searcher.name(),
                        error = %e,
                        "Search failed, skipping query"
                    );
                }
            }
        }

        info!(
            strategy = ?group.strategy,
            queries = out.queries_run,
            failed = out.queries_failed,
            new_urls = out.urls.len(),
            "Strategy complete"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, MockSearcher};

    #[test]
    fn ledger_dedupes_canonical_variants() {
        let mut ledger = UrlLedger::new();
        assert!(ledger.admit("https://reddit.com/r/x/1/").is_some());
        assert!(ledger.admit("https://old.reddit.com/r/x/1").is_none());
        assert!(ledger.admit("not a url").is_none());
        assert_eq!(ledger.invalid(), 1);
    }

    #[test]
    fn ledger_treats_title_slug_as_the_same_thread() {
        let mut ledger = UrlLedger::new();
        let first = ledger
            .admit("https://www.reddit.com/r/accounting/comments/abc123/excel_hell/")
            .unwrap();
        assert_eq!(first.as_str(), "https://reddit.com/r/accounting/comments/abc123");
        assert!(ledger
            .admit("https://old.reddit.com/r/accounting/comments/abc123/")
            .is_none());
        assert!(ledger
            .admit("https://reddit.com/r/accounting/comments/abc123/excel_hell/?sort=new")
            .is_none());
        assert!(ledger
            .admit("https://reddit.com/r/accounting/comments/def456/excel_hell/")
            .is_some());
    }

    #[test]
    fn low_primary_yield_fires_fallback() {
        let config = test_config();
        let searcher = MockSearcher::new();
        let orchestrator = QueryOrchestrator::new(&config.query, &searcher);

        let mut plan = orchestrator.plan("accountants");
        let decision = orchestrator.extend_with_fallback(&mut plan, "accountants", 1);
        assert_eq!(decision, FallbackDecision::Fired);
        let fallback = plan.fallback().unwrap();
        assert!(!fallback.queries.is_empty());
        assert!(fallback.queries.iter().all(|q| q.categories.len() == 2));
    }

    #[test]
    fn reduced_scope_never_fires_fallback() {
        let config = test_config().with_reduced_scope(true);
        let searcher = MockSearcher::new();
        let orchestrator = QueryOrchestrator::new(&config.query, &searcher);

        let mut plan = orchestrator.plan("accountants");
        let decision = orchestrator.extend_with_fallback(&mut plan, "accountants", 1);
        assert_eq!(decision, FallbackDecision::SkippedReducedScope);
        assert!(!plan.has_fallback());
    }

    #[test]
    fn sufficient_yield_skips_fallback() {
        let config = test_config();
        let searcher = MockSearcher::new();
        let orchestrator = QueryOrchestrator::new(&config.query, &searcher);
        assert_eq!(
            orchestrator.fallback_decision(config.query.fallback_min_yield),
            FallbackDecision::SkippedSufficientYield
        );
    }

    #[tokio::test]
    async fn execute_skips_failed_queries_and_dedupes_across_them() {
        let config = test_config();
        let plan_text: Vec<String> = {
            let searcher = MockSearcher::new();
            let orchestrator = QueryOrchestrator::new(&config.query, &searcher);
            orchestrator
                .plan("accountants")
                .primary()
                .queries
                .iter()
                .map(|q| q.text.clone())
                .collect()
        };

        let searcher = MockSearcher::new()
            .on_query(&plan_text[0], &["https://reddit.com/r/a/1", "https://reddit.com/r/a/2"])
            .fail_query(&plan_text[1])
            .on_query(&plan_text[2], &["https://old.reddit.com/r/a/2/", "https://reddit.com/r/a/3"]);
        let orchestrator = QueryOrchestrator::new(&config.query, &searcher);
        let plan = orchestrator.plan("accountants");
        let mut ledger = UrlLedger::new();

        let out = orchestrator
            .execute(plan.primary(), &mut ledger)
            .await;
        assert_eq!(out.queries_run, plan_text.len());
        assert_eq!(out.queries_failed, 1);
        assert_eq!(out.results_seen, 4);
        let urls: Vec<&str> = out.urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://reddit.com/r/a/1", "https://reddit.com/r/a/2", "https://reddit.com/r/a/3"]
        );
        assert_eq!(searcher.calls().len(), plan_text.len());
    }
}
