use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use unicode_segmentation::UnicodeSegmentation;

use safari_common::{AspectCategoryConfig, ConfigError, ExtractionConfig, TextField, ThreadRecord};

/// Added per term match beyond the first in the same sentence.
const EXTRA_MATCH_BONUS: f64 = 0.1;
/// Added per intensifier match in the same sentence.
const INTENSIFIER_BONUS: f64 = 0.15;
/// Distinct matched terms kept on a hit for reporting.
const MAX_MATCHED_TERMS: usize = 5;

/// One sentence of a thread, borrowed from the record it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentenceSpan<'r> {
    pub record: &'r ThreadRecord,
    pub field: TextField,
    /// Position across the whole thread, title first.
    pub index: usize,
    pub text: &'r str,
}

/// A pain signal detected in one sentence.
#[derive(Debug, Clone)]
pub struct AspectHit<'r> {
    pub category: Arc<str>,
    pub sentence: SentenceSpan<'r>,
    pub intensity: f64,
    pub negated: bool,
    pub matched: Vec<String>,
}

struct Lexicon {
    name: Arc<str>,
    description: String,
    base_intensity: f64,
    terms: Vec<Regex>,
    intensifiers: Vec<Regex>,
    requires_intensifier: bool,
}

/// Tags sentences with the configured pain-aspect categories.
///
/// Compiled once at startup; extraction itself never fails.
pub struct AspectExtractor {
    lexicons: Vec<Lexicon>,
    noise: Vec<Regex>,
    negation_cues: HashSet<String>,
    negation_window: usize,
    negation_factor: f64,
    min_intensity: f64,
}

impl AspectExtractor {
    pub fn new(
        extraction: &ExtractionConfig,
        aspects: &[AspectCategoryConfig],
    ) -> Result<Self, ConfigError> {
        let lexicons = aspects
            .iter()
            .map(compile_lexicon)
            .collect::<Result<Vec<_>, _>>()?;

        let noise = extraction
            .noise_patterns
            .iter()
            .map(|p| compile(p).map_err(|e| ConfigError::invalid("extraction.noise_patterns", e)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            lexicons,
            noise,
            negation_cues: extraction
                .negation_cues
                .iter()
                .map(|c| normalize(c))
                .collect(),
            negation_window: extraction.negation_window,
            negation_factor: extraction.negation_factor,
            min_intensity: extraction.min_intensity,
        })
    }

    pub fn category_count(&self) -> usize {
        self.lexicons.len()
    }

    pub fn describe(&self, category: &str) -> Option<&str> {
        self.lexicons
            .iter()
            .find(|l| &*l.name == category)
            .map(|l| l.description.as_str())
    }

    /// Lazily walk the thread's sentences and yield every hit, in reading order.
    pub fn extract<'e, 'r>(&'e self, record: &'r ThreadRecord) -> AspectHits<'e, 'r> {
        AspectHits {
            extractor: self,
            sentences: Box::new(sentences(record)),
            pending: VecDeque::new(),
            sentences_seen: 0,
        }
    }

    fn tag_sentence<'r>(&self, span: SentenceSpan<'r>) -> Vec<AspectHit<'r>> {
        let text = normalize(span.text);
        if self.noise.iter().any(|re| re.is_match(&text)) {
            return Vec::new();
        }

        self.lexicons
            .iter()
            .filter_map(|lexicon| {
                let m = self.match_lexicon(lexicon, &text)?;
                Some(AspectHit {
                    category: Arc::clone(&lexicon.name),
                    sentence: span,
                    intensity: m.intensity,
                    negated: m.negated,
                    matched: m.terms,
                })
            })
            .collect()
    }

    fn match_lexicon(&self, lexicon: &Lexicon, text: &str) -> Option<LexiconMatch> {
        let matches: Vec<regex::Match<'_>> = lexicon
            .terms
            .iter()
            .flat_map(|re| re.find_iter(text))
            .collect();
        if matches.is_empty() {
            return None;
        }

        let boosts: Vec<regex::Match<'_>> = lexicon
            .intensifiers
            .iter()
            .flat_map(|re| re.find_iter(text))
            .collect();
        if lexicon.requires_intensifier && boosts.is_empty() {
            return None;
        }

        let raw = lexicon.base_intensity
            + EXTRA_MATCH_BONUS * (matches.len() - 1) as f64
            + INTENSIFIER_BONUS * boosts.len() as f64;
        let mut intensity = raw.clamp(self.min_intensity, 1.0);

        // When the intensifier carries the signal, negating it negates the hit.
        let all_negated = |found: &[regex::Match<'_>]| {
            found
                .iter()
                .all(|m| self.preceded_by_negation(text, m.start()))
        };
        let negated = all_negated(&matches)
            || (lexicon.requires_intensifier && all_negated(&boosts));
        if negated {
            intensity = (intensity * self.negation_factor).max(self.min_intensity);
        }

        let mut terms: Vec<String> = Vec::new();
        for m in &matches {
            let term = m.as_str().to_string();
            if !terms.contains(&term) && terms.len() < MAX_MATCHED_TERMS {
                terms.push(term);
            }
        }

        Some(LexiconMatch {
            intensity,
            negated,
            terms,
        })
    }

    fn preceded_by_negation(&self, text: &str, start: usize) -> bool {
        text[..start]
            .unicode_words()
            .rev()
            .take(self.negation_window)
            .any(|word| self.negation_cues.contains(word))
    }
}

struct LexiconMatch {
    intensity: f64,
    negated: bool,
    terms: Vec<String>,
}

/// Iterator over the hits of one thread. Finite; one pass per `extract` call.
pub struct AspectHits<'e, 'r> {
    extractor: &'e AspectExtractor,
    sentences: Box<dyn Iterator<Item = SentenceSpan<'r>> + 'r>,
    pending: VecDeque<AspectHit<'r>>,
    sentences_seen: usize,
}

impl<'r> AspectHits<'_, 'r> {
    /// Sentences walked so far. After exhaustion, the thread's sentence count.
    pub fn sentences_seen(&self) -> usize {
        self.sentences_seen
    }

    /// Drain the iterator, returning every hit and the total sentence count.
    pub fn finish(mut self) -> (Vec<AspectHit<'r>>, usize) {
        let hits: Vec<_> = self.by_ref().collect();
        (hits, self.sentences_seen)
    }
}

impl<'r> Iterator for AspectHits<'_, 'r> {
    type Item = AspectHit<'r>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.pending.pop_front() {
                return Some(hit);
            }
            let span = self.sentences.next()?;
            self.sentences_seen += 1;
            self.pending.extend(self.extractor.tag_sentence(span));
        }
    }
}

/// Split every text field of a thread on UAX #29 sentence boundaries.
///
/// Fragments without a letter or digit are dropped, so empty fields and
/// stray punctuation contribute nothing.
pub fn sentences(record: &ThreadRecord) -> impl Iterator<Item = SentenceSpan<'_>> + '_ {
    record
        .text_fields()
        .flat_map(|(field, text)| {
            text.unicode_sentences()
                .map(str::trim)
                .filter(|s| s.chars().any(char::is_alphanumeric))
                .map(move |s| (field, s))
        })
        .enumerate()
        .map(move |(index, (field, text))| SentenceSpan {
            record,
            field,
            index,
            text,
        })
}

fn compile_lexicon(aspect: &AspectCategoryConfig) -> Result<Lexicon, ConfigError> {
    let key = |part: &str| format!("aspects.{}.{part}", aspect.name);

    let mut terms = Vec::with_capacity(aspect.phrases.len() + aspect.patterns.len());
    for phrase in &aspect.phrases {
        let re = compile(&phrase_pattern(phrase))
            .map_err(|e| ConfigError::invalid(key("phrases"), e))?;
        terms.push(re);
    }
    for pattern in &aspect.patterns {
        terms.push(compile(pattern).map_err(|e| ConfigError::invalid(key("patterns"), e))?);
    }
    let intensifiers = aspect
        .intensifiers
        .iter()
        .map(|p| compile(p).map_err(|e| ConfigError::invalid(key("intensifiers"), e)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Lexicon {
        name: Arc::from(aspect.name.as_str()),
        description: aspect.description.clone(),
        base_intensity: aspect.base_intensity,
        terms,
        intensifiers,
        requires_intensifier: aspect.requires_intensifier,
    })
}

fn compile(pattern: &str) -> Result<Regex, String> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| format!("invalid regex {pattern:?}: {e}"))
}

/// Literal phrase as a regex, word-bounded wherever the phrase edge is a word char.
fn phrase_pattern(phrase: &str) -> String {
    let phrase = normalize(phrase);
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let lead = if is_word(phrase.chars().next()) { r"\b" } else { "" };
    let trail = if is_word(phrase.chars().last()) { r"\b" } else { "" };
    format!("{lead}{}{trail}", regex::escape(&phrase))
}

/// Lowercase, straighten apostrophes, collapse whitespace runs.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(['\u{2019}', '\u{2018}'], "'")
        .to_lowercase()
}
