use std::collections::HashSet;

use serde::Serialize;

use safari_common::ScoringConfig;

use super::extractor::AspectHit;

/// Per-thread aggregate of aspect hits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AspectScore {
    pub hit_count: usize,
    pub distinct_categories: usize,
    pub sentence_count: usize,
    /// Hits per sentence. Unbounded before saturation.
    pub density: f64,
    pub intensity_avg: f64,
    /// Share of the configured categories that fired at least once.
    pub category_breadth: f64,
    pub aspect_score: f64,
}

impl AspectScore {
    pub fn zero(sentence_count: usize) -> Self {
        Self {
            hit_count: 0,
            distinct_categories: 0,
            sentence_count,
            density: 0.0,
            intensity_avg: 0.0,
            category_breadth: 0.0,
            aspect_score: 0.0,
        }
    }
}

/// Weighted blend of saturated density, mean intensity and category breadth.
#[derive(Debug, Clone)]
pub struct AspectScorer {
    density_weight: f64,
    intensity_weight: f64,
    breadth_weight: f64,
    density_saturation: f64,
    total_categories: usize,
}

impl AspectScorer {
    pub fn new(scoring: &ScoringConfig, total_categories: usize) -> Self {
        Self {
            density_weight: scoring.density_weight,
            intensity_weight: scoring.intensity_weight,
            breadth_weight: scoring.breadth_weight,
            density_saturation: scoring.density_saturation,
            total_categories,
        }
    }

    pub fn score(&self, hits: &[AspectHit<'_>], sentence_count: usize) -> AspectScore {
        if hits.is_empty() {
            return AspectScore::zero(sentence_count);
        }

        let distinct: HashSet<&str> = hits.iter().map(|h| &*h.category).collect();
        let density = hits.len() as f64 / sentence_count.max(1) as f64;
        let intensity_avg = hits.iter().map(|h| h.intensity).sum::<f64>() / hits.len() as f64;
        let category_breadth = distinct.len() as f64 / self.total_categories.max(1) as f64;

        AspectScore {
            hit_count: hits.len(),
            distinct_categories: distinct.len(),
            sentence_count,
            density,
            intensity_avg,
            category_breadth,
            aspect_score: self.blend(density, intensity_avg, category_breadth),
        }
    }

    /// Combine the three components. Non-decreasing in each argument.
    pub fn blend(&self, density: f64, intensity_avg: f64, category_breadth: f64) -> f64 {
        let saturated = density / (density + self.density_saturation);
        let score = self.density_weight * saturated
            + self.intensity_weight * intensity_avg
            + self.breadth_weight * category_breadth.min(1.0);
        score.clamp(0.0, 1.0)
    }
}
