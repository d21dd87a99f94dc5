use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/safari.toml";
pub const ENV_CONFIG_PATH: &str = "SAFARI_CONFIG";

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Run configuration loaded from TOML at startup. Read-only afterwards.
///
/// `aspect_score_threshold`, `[[aspects]]` and `[[query.categories]]` have no
/// defaults: a file without them is rejected rather than run on guesses.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafariConfig {
    pub aspect_score_threshold: f64,
    #[serde(default = "default_min_comments")]
    pub min_comments: u32,
    #[serde(default = "default_max_age_years")]
    pub max_age_years: u32,
    /// Pause between consecutive thread fetches.
    #[serde(default = "default_scrape_delay_ms")]
    pub scrape_delay_ms: u64,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub aspects: Vec<AspectCategoryConfig>,
    pub query: QueryConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    pub density_weight: f64,
    pub intensity_weight: f64,
    pub breadth_weight: f64,
    /// Density at which the density term reaches half its weight.
    #[serde(default = "default_density_saturation")]
    pub density_saturation: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            density_weight: 1.0 / 3.0,
            intensity_weight: 1.0 / 3.0,
            breadth_weight: 1.0 / 3.0,
            density_saturation: default_density_saturation(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    #[serde(default = "default_negation_cues")]
    pub negation_cues: Vec<String>,
    /// How many words before a match are searched for a negation cue.
    #[serde(default = "default_negation_window")]
    pub negation_window: usize,
    #[serde(default = "default_negation_factor")]
    pub negation_factor: f64,
    #[serde(default = "default_min_intensity")]
    pub min_intensity: f64,
    /// Sentences matching any of these are counted but never tagged.
    #[serde(default)]
    pub noise_patterns: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            negation_cues: default_negation_cues(),
            negation_window: default_negation_window(),
            negation_factor: default_negation_factor(),
            min_intensity: default_min_intensity(),
            noise_patterns: Vec::new(),
        }
    }
}

/// One pain-aspect category. Categories are data: adding one needs no code change.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectCategoryConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_base_intensity")]
    pub base_intensity: f64,
    /// Literal phrases, matched on word boundaries.
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Regular expressions, matched case-insensitively.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Terms that strengthen a hit (e.g. "crash", "useless" for tool complaints).
    #[serde(default)]
    pub intensifiers: Vec<String>,
    /// Only emit a hit when an intensifier also matches the sentence.
    #[serde(default)]
    pub requires_intensifier: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    #[serde(default = "default_site")]
    pub site: String,
    /// Results requested per primary (industry × category) query.
    #[serde(default = "default_quota")]
    pub per_category_quota: usize,
    /// Results requested per pairwise fallback query.
    #[serde(default = "default_quota")]
    pub fallback_quota: usize,
    /// Fallback fires when primary yields fewer net-new URLs than this.
    #[serde(default = "default_fallback_min_yield")]
    pub fallback_min_yield: usize,
    #[serde(default = "default_max_fallback_queries")]
    pub max_fallback_queries: usize,
    #[serde(default)]
    pub reduced_scope: ReducedScopeConfig,
    pub categories: Vec<KeywordCategory>,
}

/// Fast verification mode: fewer queries, smaller quotas, never any fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReducedScopeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reduced_quota")]
    pub per_category_quota: usize,
    #[serde(default = "default_reduced_max_queries")]
    pub max_primary_queries: usize,
}

impl Default for ReducedScopeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            per_category_quota: default_reduced_quota(),
            max_primary_queries: default_reduced_max_queries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_model")]
    pub model: String,
    /// Overrides `OLLAMA_URL` when set.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_judge_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: default_judge_model(),
            base_url: None,
            timeout_secs: default_judge_timeout(),
            temperature: 0.0,
        }
    }
}

fn default_min_comments() -> u32 {
    2
}
fn default_max_age_years() -> u32 {
    10
}
fn default_scrape_delay_ms() -> u64 {
    1000
}
fn default_density_saturation() -> f64 {
    1.0
}
fn default_negation_cues() -> Vec<String> {
    [
        "not", "no", "never", "don't", "dont", "doesn't", "isn't", "wasn't", "without",
        "hardly", "nothing",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_negation_window() -> usize {
    3
}
fn default_negation_factor() -> f64 {
    0.5
}
fn default_min_intensity() -> f64 {
    0.1
}
fn default_base_intensity() -> f64 {
    0.5
}
fn default_site() -> String {
    "reddit.com".to_string()
}
fn default_quota() -> usize {
    30
}
fn default_fallback_min_yield() -> usize {
    5
}
fn default_max_fallback_queries() -> usize {
    20
}
fn default_reduced_quota() -> usize {
    5
}
fn default_reduced_max_queries() -> usize {
    2
}
fn default_judge_model() -> String {
    "llama3".to_string()
}
fn default_judge_timeout() -> u64 {
    60
}

impl SafariConfig {
    /// Resolve the config path: explicit argument, then `SAFARI_CONFIG`, then the default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: SafariConfig = toml::from_str(content)
            .map_err(|e| ConfigError::from_toml(e, origin.to_path_buf()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn reduced_scope(&self) -> bool {
        self.query.reduced_scope.enabled
    }

    /// Force reduced-scope mode on (CLI `--test`). Never turns it off.
    pub fn with_reduced_scope(mut self, enabled: bool) -> Self {
        self.query.reduced_scope.enabled |= enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("aspect_score_threshold", self.aspect_score_threshold)?;

        let s = &self.scoring;
        for (key, w) in [
            ("scoring.density_weight", s.density_weight),
            ("scoring.intensity_weight", s.intensity_weight),
            ("scoring.breadth_weight", s.breadth_weight),
        ] {
            unit_interval(key, w)?;
        }
        let sum = s.density_weight + s.intensity_weight + s.breadth_weight;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::invalid(
                "scoring",
                format!("weights must sum to 1.0, got {sum:.6}"),
            ));
        }
        if !(s.density_saturation.is_finite() && s.density_saturation > 0.0) {
            return Err(ConfigError::invalid(
                "scoring.density_saturation",
                "must be greater than 0",
            ));
        }

        let x = &self.extraction;
        unit_interval("extraction.negation_factor", x.negation_factor)?;
        unit_interval("extraction.min_intensity", x.min_intensity)?;
        if x.min_intensity == 0.0 {
            return Err(ConfigError::invalid(
                "extraction.min_intensity",
                "must be greater than 0",
            ));
        }

        if self.aspects.is_empty() {
            return Err(ConfigError::invalid("aspects", "at least one category is required"));
        }
        let mut names = HashSet::new();
        for aspect in &self.aspects {
            let key = format!("aspects.{}", aspect.name);
            if aspect.name.trim().is_empty() {
                return Err(ConfigError::invalid("aspects.name", "must not be empty"));
            }
            if !names.insert(aspect.name.as_str()) {
                return Err(ConfigError::invalid(key, "duplicate category name"));
            }
            unit_interval(&format!("{key}.base_intensity"), aspect.base_intensity)?;
            if aspect.phrases.is_empty() && aspect.patterns.is_empty() {
                return Err(ConfigError::invalid(key, "needs at least one phrase or pattern"));
            }
            if aspect.requires_intensifier && aspect.intensifiers.is_empty() {
                return Err(ConfigError::invalid(
                    format!("{key}.intensifiers"),
                    "required when requires_intensifier = true",
                ));
            }
        }

        let q = &self.query;
        if q.categories.is_empty() {
            return Err(ConfigError::invalid(
                "query.categories",
                "at least one keyword category is required",
            ));
        }
        for category in &q.categories {
            if category.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    format!("query.categories.{}", category.name),
                    "needs at least one keyword",
                ));
            }
        }
        for (key, quota) in [
            ("query.per_category_quota", q.per_category_quota),
            ("query.fallback_quota", q.fallback_quota),
            ("query.reduced_scope.per_category_quota", q.reduced_scope.per_category_quota),
            ("query.reduced_scope.max_primary_queries", q.reduced_scope.max_primary_queries),
        ] {
            if quota == 0 {
                return Err(ConfigError::invalid(key, "must be at least 1"));
            }
        }

        if self.judge.timeout_secs == 0 {
            return Err(ConfigError::invalid("judge.timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Log the effective settings once at startup.
    pub fn log_summary(&self) {
        info!(
            threshold = self.aspect_score_threshold,
            min_comments = self.min_comments,
            max_age_years = self.max_age_years,
            aspects = self.aspects.len(),
            query_categories = self.query.categories.len(),
            reduced_scope = self.reduced_scope(),
            judge_model = self.judge.model.as_str(),
            "Configuration loaded"
        );
    }
}

fn unit_interval(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("must be within [0, 1], got {value}")))
    }
}

/// Secrets and endpoints read from the environment (optionally via `.env`).
#[derive(Debug, Clone, Default)]
pub struct RuntimeEnv {
    pub ollama_url: Option<String>,
    pub serper_api_key: Option<String>,
}

impl RuntimeEnv {
    pub fn from_env() -> Self {
        Self {
            ollama_url: non_empty_env("OLLAMA_URL"),
            serper_api_key: non_empty_env("SERPER_API_KEY"),
        }
    }

    /// Log which secrets are present without printing them.
    pub fn log_redacted(&self) {
        info!(
            ollama_url = self.ollama_url.as_deref().unwrap_or("(default)"),
            serper_api_key = if self.serper_api_key.is_some() { "set" } else { "unset" },
            "Runtime environment"
        );
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
aspect_score_threshold = 0.5

[[aspects]]
name = "seeking_alternative"
phrases = ["is there an app"]

[query]
[[query.categories]]
name = "frustration"
keywords = ["hate", "annoying"]
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = SafariConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.aspect_score_threshold, 0.5);
        assert_eq!(config.min_comments, 2);
        assert_eq!(config.max_age_years, 10);
        assert_eq!(config.query.site, "reddit.com");
        assert_eq!(config.query.fallback_min_yield, 5);
        assert!(!config.reduced_scope());
        assert_eq!(config.judge.model, "llama3");
        assert!(config.extraction.negation_cues.iter().any(|c| c == "not"));
    }

    #[test]
    fn missing_threshold_names_the_key() {
        let content = MINIMAL.replace("aspect_score_threshold = 0.5", "");
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        match err {
            ConfigError::Missing { key, .. } => assert_eq!(key, "aspect_score_threshold"),
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn missing_aspects_names_the_key() {
        let content = MINIMAL.replace(
            "[[aspects]]\nname = \"seeking_alternative\"\nphrases = [\"is there an app\"]\n",
            "",
        );
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key, .. } if key == "aspects"));
    }

    #[test]
    fn threshold_out_of_range_is_invalid() {
        let content = MINIMAL.replace("0.5", "1.5");
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "aspect_score_threshold"));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let content = format!(
            "{MINIMAL}\n[scoring]\ndensity_weight = 0.5\nintensity_weight = 0.5\nbreadth_weight = 0.5\n"
        );
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "scoring"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let content = format!("typo_threshold = 3\n{MINIMAL}");
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn duplicate_category_is_invalid() {
        let content = format!("{MINIMAL}\n[[aspects]]\nname = \"seeking_alternative\"\nphrases = [\"x\"]\n");
        let err = SafariConfig::from_toml_str(&content).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn reduced_scope_flag_only_turns_on() {
        let config = SafariConfig::from_toml_str(MINIMAL).unwrap().with_reduced_scope(true);
        assert!(config.reduced_scope());
        let config = config.with_reduced_scope(false);
        assert!(config.reduced_scope());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SafariConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safari.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = SafariConfig::load(&path).unwrap();
        assert_eq!(config.aspects.len(), 1);
    }

    #[test]
    fn explicit_path_wins() {
        let path = SafariConfig::resolve_path(Some(Path::new("/tmp/custom.toml")));
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn shipped_config_is_valid() {
        let content = include_str!("../../../config/safari.toml");
        let config = SafariConfig::from_toml_str(content).unwrap();
        assert_eq!(config.aspect_score_threshold, 0.5);
        assert!(config.aspects.iter().any(|a| a.name == "tool_complaint"));
        assert!(config.aspects.iter().any(|a| a.name == "seeking_alternative"));
    }
}
