use serde::Serialize;

use safari_common::{KeywordCategory, QueryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One query per industry × keyword category.
    Primary,
    /// Pairs of keyword categories, used when primary under-yields.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedQuery {
    pub text: String,
    /// Keyword categories combined into this query.
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyGroup {
    pub strategy: Strategy,
    /// Results requested per query.
    pub quota: usize,
    pub queries: Vec<PlannedQuery>,
}

/// Query groups for one run. Fallback is attached only after primary ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    primary: StrategyGroup,
    fallback: Option<StrategyGroup>,
}

impl QueryPlan {
    pub fn new(primary: StrategyGroup) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn primary(&self) -> &StrategyGroup {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&StrategyGroup> {
        self.fallback.as_ref()
    }

    /// Groups in execution order.
    pub fn groups(&self) -> impl Iterator<Item = &StrategyGroup> {
        std::iter::once(&self.primary).chain(self.fallback.as_ref())
    }

    pub fn group(&self, strategy: Strategy) -> Option<&StrategyGroup> {
        self.groups().find(|g| g.strategy == strategy)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn query_count(&self) -> usize {
        self.groups().map(|g| g.queries.len()).sum()
    }

    pub(crate) fn attach_fallback(&mut self, group: StrategyGroup) {
        self.fallback = Some(group);
    }
}

/// The primary group: one query per keyword category.
///
/// Reduced scope caps both the number of queries and the per-query quota.
pub fn primary_group(config: &QueryConfig, industry: &str) -> StrategyGroup {
    let (quota, max_queries) = if config.reduced_scope.enabled {
        (
            config.reduced_scope.per_category_quota,
            config.reduced_scope.max_primary_queries,
        )
    } else {
        (config.per_category_quota, config.categories.len())
    };

    let queries = config
        .categories
        .iter()
        .take(max_queries)
        .map(|category| PlannedQuery {
            text: compose(&config.site, industry, &[category]),
            categories: vec![category.name.clone()],
        })
        .collect();

    StrategyGroup {
        strategy: Strategy::Primary,
        quota,
        queries,
    }
}

/// Every unordered pair of keyword categories, capped at `max_fallback_queries`.
pub fn pairwise_group(config: &QueryConfig, industry: &str) -> StrategyGroup {
    let categories = &config.categories;
    let queries = categories
        .iter()
        .enumerate()
        .flat_map(|(i, a)| categories[i + 1..].iter().map(move |b| (a, b)))
        .take(config.max_fallback_queries)
        .map(|(a, b)| PlannedQuery {
            text: compose(&config.site, industry, &[a, b]),
            categories: vec![a.name.clone(), b.name.clone()],
        })
        .collect();

    StrategyGroup {
        strategy: Strategy::Fallback,
        quota: config.fallback_quota,
        queries,
    }
}

/// `site:<site> "<industry>" ("kw1" OR "kw2") ...`, one OR-group per category.
fn compose(site: &str, industry: &str, categories: &[&KeywordCategory]) -> String {
    let mut parts = Vec::with_capacity(categories.len() + 2);
    if !site.trim().is_empty() {
        parts.push(format!("site:{}", site.trim()));
    }
    let industry = quoted(industry);
    if !industry.is_empty() {
        parts.push(industry);
    }
    parts.extend(categories.iter().filter_map(|c| keyword_group(&c.keywords)));
    parts.join(" ")
}

fn keyword_group(keywords: &[String]) -> Option<String> {
    let terms: Vec<String> = keywords
        .iter()
        .map(|k| quoted(k))
        .filter(|k| !k.is_empty())
        .collect();
    match terms.len() {
        0 => None,
        1 => terms.into_iter().next(),
        _ => Some(format!("({})", terms.join(" OR "))),
    }
}

fn quoted(term: &str) -> String {
    let cleaned = term.replace('"', "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        String::new()
    } else {
        format!("\"{cleaned}\"")
    }
}
