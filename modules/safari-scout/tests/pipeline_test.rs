//! End-to-end runs of the safari pipeline against mock adapters.

use std::sync::Arc;

use safari_common::{OpportunityLabel, Verdict};
use safari_scout::aspects::{AspectExtractor, AspectScorer};
use safari_scout::discovery::FallbackDecision;
use safari_scout::judge::HeuristicJudge;
use safari_scout::pipeline::Disposition;
use safari_scout::report::render_markdown;
use safari_scout::testing::*;

const PAIN_URL: &str = "https://www.reddit.com/r/Accounting/comments/abc/excel_crashing/";

#[tokio::test]
async fn accountants_pain_thread_is_escalated_once() {
    let searcher = Arc::new(MockSearcher::new().on_any(&[PAIN_URL]));
    let scraper = Arc::new(MockScraper::new().on_thread(pain_thread(PAIN_URL)));
    let judge = Arc::new(FixedJudge::new(OpportunityLabel::StrongOpportunity));

    let report = run_safari(
        test_config(),
        searcher,
        scraper,
        judge.clone(),
        &options("accountants", 10),
    )
    .await;

    assert_eq!(report.outcomes.len(), 1);
    let outcome = &report.outcomes[0];
    let assessment = outcome.assessment.as_ref().unwrap();
    let categories: Vec<&str> = assessment.aspects.iter().map(|a| a.category.as_str()).collect();

    assert!(assessment.score.hit_count >= 2);
    assert!(categories.contains(&"tool_complaint"));
    assert!(categories.contains(&"seeking_alternative"));
    assert!(assessment.score.aspect_score >= 0.5);
    assert_eq!(judge.calls(), 1);
    assert_eq!(outcome.verdict, Verdict::StrongOpportunity);
}

#[test]
fn accountants_pain_thread_scores_as_expected() {
    let config = test_config();
    let extractor = AspectExtractor::new(&config.extraction, &config.aspects).unwrap();
    let scorer = AspectScorer::new(&config.scoring, extractor.category_count());
    let record = pain_thread(PAIN_URL);

    let (hits, sentences) = extractor.extract(&record).finish();
    let score = scorer.score(&hits, sentences);

    assert_eq!(sentences, 1);
    // tool_complaint, manual_process (excel), seeking_alternative, ux_frustration (crash)
    assert_eq!(score.hit_count, 4);
    assert_eq!(score.distinct_categories, 4);
    assert!((score.aspect_score - 0.779).abs() < 0.01, "score {}", score.aspect_score);
}

#[tokio::test]
async fn judge_failure_still_reports_weak_opportunity() {
    let searcher = Arc::new(MockSearcher::new().on_any(&[PAIN_URL]));
    let scraper = Arc::new(MockScraper::new().on_thread(pain_thread(PAIN_URL)));

    let report = run_safari(
        test_config(),
        searcher,
        scraper,
        Arc::new(FailingJudge),
        &options("accountants", 10),
    )
    .await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.verdict, Verdict::WeakOpportunity);
    assert_eq!(report.stats.judge_failures, 1);
    assert_eq!(report.stats.weak, 1);
}

#[tokio::test]
async fn mixed_run_reports_unscored_and_classified_counts() {
    let searcher = Arc::new(MockSearcher::new().on_any(&[
        "https://reddit.com/r/accounting/1",
        "https://reddit.com/r/accounting/2",
        "https://reddit.com/r/accounting/3",
        "not a url",
    ]));
    let scraper = Arc::new(
        MockScraper::new()
            .on_thread(pain_thread("https://reddit.com/r/accounting/1"))
            .on_thread(bland_thread("https://reddit.com/r/accounting/3")),
    );

    let report = run_safari(
        test_config(),
        searcher,
        scraper,
        Arc::new(HeuristicJudge),
        &options("accountants", 10),
    )
    .await;

    assert_eq!(report.stats.threads_processed, 3);
    assert_eq!(report.stats.unscored, 1);
    assert_eq!(report.stats.classified(), 2);
    // Dropped once per query that returned it.
    assert!(report.stats.invalid_urls >= 1);
    assert!(report.stats.to_string().contains("Invalid results:"));
    // Three URLs is below the fallback minimum of five.
    assert_eq!(report.stats.fallback, Some(FallbackDecision::Fired));

    let verdicts: Vec<Verdict> = report.outcomes.iter().map(|o| o.verdict).collect();
    assert_eq!(
        verdicts,
        vec![Verdict::StrongOpportunity, Verdict::Unscored, Verdict::NotOpportunity]
    );
    assert!(matches!(report.outcomes[1].disposition, Disposition::Unscored { .. }));

    let md = render_markdown(&report, chrono::Utc::now());
    assert!(md.contains("| Unscored | 1 |"));
    assert!(md.contains("### 1. Excel is crashing constantly"));
}
