pub mod extractor;
pub mod scorer;

pub use extractor::{sentences, AspectExtractor, AspectHit, AspectHits, SentenceSpan};
pub use scorer::{AspectScore, AspectScorer};

use serde::Serialize;

use ai_client::util::truncate_chars;

const EVIDENCE_CHARS: usize = 160;

/// Hits of one category in one thread, owned so it outlives the record borrow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AspectTally {
    pub category: String,
    pub count: usize,
    pub max_intensity: f64,
    /// First sentence that triggered the category.
    pub evidence: String,
}

/// Group hits by category, ordered by first appearance.
pub fn tally(hits: &[AspectHit<'_>]) -> Vec<AspectTally> {
    let mut tallies: Vec<AspectTally> = Vec::new();
    for hit in hits {
        match tallies.iter_mut().find(|t| t.category == *hit.category) {
            Some(t) => {
                t.count += 1;
                t.max_intensity = t.max_intensity.max(hit.intensity);
            }
            None => tallies.push(AspectTally {
                category: hit.category.to_string(),
                count: 1,
                max_intensity: hit.intensity,
                evidence: truncate_chars(hit.sentence.text, EVIDENCE_CHARS).to_string(),
            }),
        }
    }
    tallies
}
