use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use dialoguer::Input;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use safari_common::{RuntimeEnv, SafariConfig};
use safari_scout::judge::{HeuristicJudge, LlmJudge, SemanticJudge};
use safari_scout::pipeline::{RunOptions, Safari, SafariDeps};
use safari_scout::report;
use safari_scout::scraper::{DuckDuckGoSearcher, RedditScraper, SerperSearcher, WebSearcher};

#[derive(Parser)]
#[command(name = "safari")]
#[command(about = "Find discussion threads where professionals ask for software that does not exist yet")]
#[command(version)]
struct Cli {
    /// Target industry, e.g. "accountants". Prompted for when omitted.
    #[arg(short, long)]
    industry: Option<String>,

    /// Maximum threads to process
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    limit: u32,

    /// Reduced scope: fewer queries, smaller quotas, no fallback
    #[arg(long = "test")]
    reduced_scope: bool,

    /// Config file (default: config/safari.toml)
    #[arg(long, env = "SAFARI_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = JudgeBackend::Llm)]
    judge: JudgeBackend,

    #[arg(long, value_enum, default_value_t = SearchBackend::Duckduckgo)]
    search: SearchBackend,

    /// Directory for the Markdown report
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum JudgeBackend {
    /// Local Ollama model
    Llm,
    /// Keyword rule, no model needed
    Heuristic,
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchBackend {
    Duckduckgo,
    /// Requires SERPER_API_KEY
    Serper,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }

    let (safari, options) = match setup(&cli) {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let stop = safari.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current thread");
            stop.stop();
        }
    });

    let report = safari.run(&options).await;
    println!("{}", report.stats);

    match report::write_markdown(&report, &cli.report_dir) {
        Ok(path) => info!(path = %path.display(), "Report written"),
        Err(e) => warn!("Failed to write report: {:#}", e),
    }
    ExitCode::SUCCESS
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("safari=info".parse()?))
        .init();
    Ok(())
}

fn setup(cli: &Cli) -> Result<(Safari, RunOptions)> {
    let path = SafariConfig::resolve_path(cli.config.as_deref());
    let config = SafariConfig::load(&path)?.with_reduced_scope(cli.reduced_scope);
    config.log_summary();

    let env = RuntimeEnv::from_env();
    env.log_redacted();

    let industry = match &cli.industry {
        Some(industry) if !industry.trim().is_empty() => industry.trim().to_string(),
        _ => prompt_industry()?,
    };

    let searcher: Arc<dyn WebSearcher> = match cli.search {
        SearchBackend::Duckduckgo => Arc::new(DuckDuckGoSearcher::new()?),
        SearchBackend::Serper => {
            let Some(key) = env.serper_api_key.as_deref() else {
                bail!("--search serper requires SERPER_API_KEY");
            };
            Arc::new(SerperSearcher::new(key)?)
        }
    };
    let judge: Arc<dyn SemanticJudge> = match cli.judge {
        JudgeBackend::Llm => Arc::new(LlmJudge::ollama(&config.judge, &env)?),
        JudgeBackend::Heuristic => Arc::new(HeuristicJudge),
    };

    let deps = SafariDeps::builder()
        .searcher(searcher)
        .scraper(Arc::new(RedditScraper::new()?))
        .judge(judge)
        .build();
    let safari = Safari::new(Arc::new(config), deps)?;

    Ok((
        safari,
        RunOptions {
            industry,
            limit: cli.limit as usize,
        },
    ))
}

fn prompt_industry() -> Result<String> {
    let industry: String = Input::new()
        .with_prompt("Target industry")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("industry must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read industry from terminal")?;
    Ok(industry.trim().to_string())
}
