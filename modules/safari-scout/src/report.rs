use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use safari_common::Verdict;

use crate::pipeline::{Disposition, SafariReport, ThreadOutcome};

/// Render the run as a Markdown document, best threads first.
pub fn render_markdown(report: &SafariReport, generated_at: DateTime<Utc>) -> String {
    let stats = &report.stats;
    let mut md = format!(
        r#"# Pain Safari: {industry}

Generated {generated} (run `{run_id}`)

## Summary

| | |
|---|---|
| Threads processed | {processed} |
| Classified | {classified} |
| Unscored | {unscored} |
| Strong opportunities | {strong} |
| Weak opportunities | {weak} |
| Not opportunities | {not_opportunity} |
| Judge failures | {failures} |

## Threads

"#,
        industry = report.industry,
        generated = generated_at.format("%Y-%m-%d %H:%M UTC"),
        run_id = report.run_id,
        processed = stats.threads_processed,
        classified = stats.classified(),
        unscored = stats.unscored,
        strong = stats.strong,
        weak = stats.weak,
        not_opportunity = stats.not_opportunity,
        failures = stats.judge_failures,
    );

    let (evaluated, unscored): (Vec<&ThreadOutcome>, Vec<&ThreadOutcome>) = report
        .ranked()
        .into_iter()
        .partition(|o| o.verdict != Verdict::Unscored);

    if evaluated.is_empty() {
        md.push_str("_No threads were evaluated._\n\n");
    }
    for (rank, outcome) in evaluated.iter().enumerate() {
        md.push_str(&render_outcome(rank + 1, outcome));
    }

    if !unscored.is_empty() {
        md.push_str("## Not evaluated\n\n");
        for outcome in unscored {
            let reason = match &outcome.disposition {
                Disposition::Unscored { reason } => reason.as_str(),
                _ => "",
            };
            md.push_str(&format!("- <{}>: {}\n", outcome.url, reason));
        }
        md.push('\n');
    }

    if !report.queries.is_empty() {
        md.push_str("## Queries\n\n");
        for query in &report.queries {
            md.push_str(&format!("- `{query}`\n"));
        }
    }

    md
}

fn render_outcome(rank: usize, outcome: &ThreadOutcome) -> String {
    let title = outcome
        .title()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("(untitled)");
    let mut section = format!(
        "### {rank}. {title}\n\n- **Verdict:** {}\n- **Aspect score:** {:.3}\n- **Link:** <{}>\n",
        outcome.verdict,
        outcome.aspect_score(),
        outcome.url,
    );

    match &outcome.disposition {
        Disposition::Ineligible { reason } => {
            section.push_str(&format!("- **Skipped judge:** {reason}\n"));
        }
        Disposition::Gated(decision) => {
            if let Some(judgment) = &decision.judgment {
                if let Some(pain_type) = &judgment.pain_type {
                    section.push_str(&format!("- **Pain type:** {pain_type}\n"));
                }
                if let Some(confidence) = judgment.confidence {
                    section.push_str(&format!("- **Confidence:** {confidence:.2}\n"));
                }
                if let Some(reasoning) = &judgment.reasoning {
                    section.push_str(&format!("- **Reasoning:** {reasoning}\n"));
                }
            }
            if let Some(error) = &decision.judge_error {
                section.push_str(&format!("- **Judge failed:** {error}\n"));
            }
        }
        Disposition::Unscored { .. } => {}
    }

    if let Some(assessment) = &outcome.assessment {
        if !assessment.aspects.is_empty() {
            section.push_str("- **Aspects:**\n");
            for aspect in &assessment.aspects {
                section.push_str(&format!(
                    "  - {} ×{}: \"{}\"\n",
                    aspect.category, aspect.count, aspect.evidence
                ));
            }
        }
    }
    section.push('\n');
    section
}

/// `report_<industry>_<timestamp>.md`, with the industry reduced to a safe slug.
pub fn report_file_name(industry: &str, generated_at: DateTime<Utc>) -> String {
    let slug: String = industry
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "industry" } else { slug };
    format!("report_{slug}_{}.md", generated_at.format("%Y%m%d_%H%M%S"))
}

/// Write the Markdown report into `dir`, creating it if needed.
pub fn write_markdown(report: &SafariReport, dir: &Path) -> Result<PathBuf> {
    let generated_at = Utc::now();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let path = dir.join(report_file_name(&report.industry, generated_at));
    std::fs::write(&path, render_markdown(report, generated_at))
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspects::{AspectScore, AspectTally};
    use crate::discovery::Strategy;
    use crate::gate::GateDecision;
    use crate::judge::Judgment;
    use crate::pipeline::{Assessment, SafariStats};
    use crate::testing::{bland_thread, pain_thread, url};
    use chrono::TimeZone;
    use safari_common::OpportunityLabel;

    fn assessed(record: safari_common::ThreadRecord, score: f64) -> Assessment {
        Assessment {
            record,
            score: AspectScore {
                aspect_score: score,
                ..AspectScore::zero(1)
            },
            aspects: vec![AspectTally {
                category: "tool_complaint".into(),
                count: 1,
                max_intensity: 0.85,
                evidence: "Excel is crashing constantly".into(),
            }],
        }
    }

    fn report() -> SafariReport {
        let weak = ThreadOutcome::gated(
            Strategy::Primary,
            assessed(bland_thread("https://reddit.com/r/a/1"), 0.6),
            GateDecision::from_judge(Err("timed out".into())),
        );
        let strong = ThreadOutcome::gated(
            Strategy::Primary,
            assessed(pain_thread("https://reddit.com/r/a/2"), 0.78),
            GateDecision::from_judge(Ok(Judgment {
                label: OpportunityLabel::StrongOpportunity,
                confidence: Some(0.9),
                reasoning: Some("Recurring reconciliation pain".into()),
                pain_type: Some("invoice reconciliation".into()),
            })),
        );
        let unscored =
            ThreadOutcome::unscored(url("https://reddit.com/r/a/3"), Strategy::Fallback, "HTTP 429");
        let outcomes = vec![weak, unscored, strong];
        let mut stats = SafariStats::default();
        for o in &outcomes {
            stats.record(o);
        }
        SafariReport {
            run_id: "run-1".into(),
            industry: "accountants".into(),
            queries: vec![r#"site:reddit.com "accountants" "spreadsheet""#.into()],
            outcomes,
            stats,
        }
    }

    #[test]
    fn ranked_puts_strong_first_and_unscored_last() {
        let report = report();
        let verdicts: Vec<Verdict> = report.ranked().iter().map(|o| o.verdict).collect();
        assert_eq!(
            verdicts,
            vec![Verdict::StrongOpportunity, Verdict::WeakOpportunity, Verdict::Unscored]
        );
    }

    #[test]
    fn markdown_lists_verdicts_and_unscored_reasons() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let md = render_markdown(&report(), at);
        assert!(md.starts_with("# Pain Safari: accountants"));
        assert!(md.contains("| Unscored | 1 |"));
        assert!(md.contains("### 1. Excel is crashing constantly"));
        assert!(md.contains("**Pain type:** invoice reconciliation"));
        assert!(md.contains("**Judge failed:** timed out"));
        assert!(md.contains("<https://reddit.com/r/a/3>: HTTP 429"));
        assert!(md.contains("tool_complaint ×1"));
    }

    #[test]
    fn file_name_is_slugged_and_timestamped() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            report_file_name("Real Estate / Agents", at),
            "report_real_estate___agents_20260301_123005.md"
        );
        assert_eq!(report_file_name("  ", at), "report_industry_20260301_123005.md");
    }

    #[test]
    fn write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");
        let path = write_markdown(&report(), &target).unwrap();
        assert!(path.starts_with(&target));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("## Queries"));
    }
}
