use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use tracing::{info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use safari_common::{ConfigError, SafariConfig, ThreadRecord, ThreadUrl};

use crate::aspects::{tally, AspectExtractor, AspectScorer};
use crate::discovery::{FallbackDecision, QueryOrchestrator, Strategy, UrlLedger};
use crate::gate::ClassificationGate;
use crate::judge::{JudgeRequest, SemanticJudge};
use crate::scraper::{ThreadScraper, WebSearcher};

use super::outcome::{Assessment, SafariReport, ThreadOutcome};
use super::stats::SafariStats;

/// External adapters for one run.
#[derive(Clone, TypedBuilder)]
pub struct SafariDeps {
    pub searcher: Arc<dyn WebSearcher>,
    pub scraper: Arc<dyn ThreadScraper>,
    pub judge: Arc<dyn SemanticJudge>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub industry: String,
    /// Maximum threads to process. Stops URL consumption, never truncates results.
    pub limit: usize,
}

/// Cooperative stop flag, checked before each thread starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One pipeline run: discovery, scraping, extraction, scoring and gating.
///
/// Owns all run-scoped state. Threads are processed one at a time, in
/// discovery order.
pub struct Safari {
    config: Arc<SafariConfig>,
    deps: SafariDeps,
    extractor: AspectExtractor,
    scorer: AspectScorer,
    gate: ClassificationGate,
    ledger: UrlLedger,
    stats: SafariStats,
    outcomes: Vec<ThreadOutcome>,
    stop: StopHandle,
    fetched_any: bool,
}

impl Safari {
    pub fn new(config: Arc<SafariConfig>, deps: SafariDeps) -> Result<Self, ConfigError> {
        let extractor = AspectExtractor::new(&config.extraction, &config.aspects)?;
        let scorer = AspectScorer::new(&config.scoring, extractor.category_count());
        let gate = ClassificationGate::new(
            config.aspect_score_threshold,
            Duration::from_secs(config.judge.timeout_secs),
            Arc::clone(&deps.judge),
        );
        Ok(Self {
            config,
            deps,
            extractor,
            scorer,
            gate,
            ledger: UrlLedger::new(),
            stats: SafariStats::default(),
            outcomes: Vec::new(),
            stop: StopHandle::default(),
            fetched_any: false,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn run(mut self, options: &RunOptions) -> SafariReport {
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = run_id.as_str(),
            industry = options.industry.as_str(),
            limit = options.limit,
            reduced_scope = self.config.reduced_scope(),
            searcher = self.deps.searcher.name(),
            scraper = self.deps.scraper.name(),
            judge = self.deps.judge.name(),
            "Safari run starting"
        );

        let config = Arc::clone(&self.config);
        let searcher = Arc::clone(&self.deps.searcher);
        let orchestrator = QueryOrchestrator::new(&config.query, searcher.as_ref());

        let mut plan = orchestrator.plan(&options.industry);
        let primary = orchestrator.execute(plan.primary(), &mut self.ledger).await;
        self.stats.record_yield(&primary);
        let primary_yield = primary.urls.len();
        self.consume(primary.urls, Strategy::Primary, options).await;

        if self.should_continue(options) {
            let decision =
                orchestrator.extend_with_fallback(&mut plan, &options.industry, primary_yield);
            self.stats.fallback = Some(decision);
            if decision == FallbackDecision::Fired {
                if let Some(group) = plan.fallback() {
                    let fallback = orchestrator.execute(group, &mut self.ledger).await;
                    self.stats.record_yield(&fallback);
                    self.consume(fallback.urls, Strategy::Fallback, options).await;
                }
            }
        }

        self.stats.invalid_urls = self.ledger.invalid() as u32;
        self.stats.stopped_early = self.stop.is_stopped();
        info!(
            run_id = run_id.as_str(),
            processed = self.stats.threads_processed,
            classified = self.stats.classified(),
            unscored = self.stats.unscored,
            "Safari run complete"
        );

        SafariReport {
            run_id,
            industry: options.industry.clone(),
            queries: plan
                .groups()
                .flat_map(|g| g.queries.iter().map(|q| q.text.clone()))
                .collect(),
            outcomes: self.outcomes,
            stats: self.stats,
        }
    }

    fn should_continue(&self, options: &RunOptions) -> bool {
        self.outcomes.len() < options.limit && !self.stop.is_stopped()
    }

    async fn consume(&mut self, urls: Vec<ThreadUrl>, strategy: Strategy, options: &RunOptions) {
        for url in urls {
            if self.stop.is_stopped() {
                info!("Stop requested, no further threads will start");
                return;
            }
            if self.outcomes.len() >= options.limit {
                info!(limit = options.limit, "Thread limit reached");
                return;
            }

            if self.fetched_any && self.config.scrape_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.scrape_delay_ms)).await;
            }
            self.fetched_any = true;

            let outcome = self.process(url, strategy, &options.industry).await;
            info!(
                url = %outcome.url,
                verdict = %outcome.verdict,
                score = outcome.aspect_score(),
                "Thread resolved"
            );
            self.stats.record(&outcome);
            self.outcomes.push(outcome);
        }
    }

    /// Resolve one thread end to end. Never fails: upstream errors become UNSCORED.
    pub async fn process(&self, url: ThreadUrl, strategy: Strategy, industry: &str) -> ThreadOutcome {
        let record = match self.deps.scraper.fetch(&url).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    url = %url,
                    scraper = self.deps.scraper.name(),
                    error = %e,
                    "Scrape failed, thread unscored"
                );
                return ThreadOutcome::unscored(url, strategy, format!("{e:#}"));
            }
        };

        let (hits, sentence_count) = self.extractor.extract(&record).finish();
        let score = self.scorer.score(&hits, sentence_count);
        let aspects = tally(&hits);
        drop(hits);

        if let Some(reason) = self.ineligibility(&record, Utc::now()) {
            info!(url = %url, reason = reason.as_str(), "Thread ineligible");
            let assessment = Assessment {
                record,
                score,
                aspects,
            };
            return ThreadOutcome::ineligible(strategy, assessment, reason);
        }

        let decision = self
            .gate
            .classify(&score, || {
                JudgeRequest::new(industry, &record, &aspects, |category| {
                    self.extractor.describe(category).map(str::to_string)
                })
            })
            .await;

        ThreadOutcome::gated(
            strategy,
            Assessment {
                record,
                score,
                aspects,
            },
            decision,
        )
    }

    /// Why a fetched thread is outside the comment or age window, if it is.
    fn ineligibility(&self, record: &ThreadRecord, now: DateTime<Utc>) -> Option<String> {
        if record.comment_count < self.config.min_comments {
            return Some(format!(
                "{} comments, minimum is {}",
                record.comment_count, self.config.min_comments
            ));
        }
        let published = record.published_at?;
        let cutoff =
            now.checked_sub_months(Months::new(self.config.max_age_years.saturating_mul(12)))?;
        (published < cutoff).then(|| {
            format!(
                "published {}, older than {} years",
                published.format("%Y-%m-%d"),
                self.config.max_age_years
            )
        })
    }
}
