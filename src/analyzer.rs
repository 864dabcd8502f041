/*!
 * Document difficulty analysis.
 *
 * Scores a document's translation difficulty from term density,
 * structural complexity and sentence length, recommends a chunking
 * strategy from configurable thresholds and produces a rough cost
 * estimate. Pure: no side effects beyond the returned value.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunker::{estimate_tokens, split_sentences};
use crate::errors::PipelineError;
use crate::models::{ChunkStrategy, DocumentAnalysis, PageText};
use crate::pipeline_config::{AnalyzerThresholds, UnitPrice};

/// Academic and technical vocabulary that signals translation difficulty
const ACADEMIC_TERMS: &[&str] = &[
    "analysis",
    "theory",
    "concept",
    "philosophy",
    "methodology",
    "framework",
    "paradigm",
    "discourse",
    "phenomenology",
    "ontology",
    "epistemology",
    "hermeneutics",
    "dialectics",
    "metaphysics",
    "existentialism",
    "deconstruction",
];

/// Abstract concepts that resist literal translation
const ABSTRACT_CONCEPTS: &[&str] = &[
    "being",
    "existence",
    "authenticity",
    "truth",
    "reality",
    "consciousness",
    "subjectivity",
    "objectivity",
    "meaning",
    "interpretation",
    "understanding",
    "experience",
    "perception",
    "knowledge",
    "transcendence",
];

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    // Numbered or all-caps heading lines
    Regex::new(r"(?m)^\s*(?:\d+\.\s+)?[A-Z][A-Z\s]{3,}$").expect("valid heading regex")
});

static TABLE_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\S[^\n]*\|[^\n]*\|").expect("valid table regex"));

/// Scores documents and recommends a chunking strategy
#[derive(Debug, Clone)]
pub struct DocumentAnalyzer {
    thresholds: AnalyzerThresholds,
    unit_price: UnitPrice,
}

impl DocumentAnalyzer {
    pub fn new(thresholds: AnalyzerThresholds, unit_price: UnitPrice) -> Self {
        Self {
            thresholds,
            unit_price,
        }
    }

    /// Analyze a document's pages.
    ///
    /// Fails only on empty input; never partially fails.
    pub fn analyze(&self, pages: &[PageText]) -> Result<DocumentAnalysis, PipelineError> {
        let total_words: usize = pages
            .iter()
            .map(|p| p.text.split_whitespace().count())
            .sum();
        if total_words == 0 {
            return Err(PipelineError::EmptyDocument);
        }

        let term_density = self.term_density(pages, total_words);
        let structural_complexity = self.structural_complexity(pages);
        let sentence_length_factor = self.sentence_length_factor(pages);

        // Weighted sum of normalized sub-scores; weights follow the
        // sentence-length / terminology / structure split of the
        // complexity heuristic.
        let difficulty_score = (sentence_length_factor * 0.3
            + term_density * 0.4
            + structural_complexity * 0.3)
            .clamp(0.0, 1.0);

        let recommended_strategy = if difficulty_score < self.thresholds.token_bound_below {
            ChunkStrategy::TokenBound
        } else if difficulty_score > self.thresholds.hybrid_above {
            ChunkStrategy::Hybrid
        } else {
            ChunkStrategy::Semantic
        };

        let total_tokens: usize = pages.iter().map(|p| estimate_tokens(&p.text)).sum();
        let output_tokens = (total_tokens as f64 * self.thresholds.expansion_factor) as u64;
        let estimated_cost_usd = self
            .unit_price
            .cost_usd(total_tokens as u64, output_tokens);

        debug!(
            "Analyzed {} pages: difficulty {:.3}, strategy {}, ~{} tokens, est ${:.4}",
            pages.len(),
            difficulty_score,
            recommended_strategy,
            total_tokens,
            estimated_cost_usd
        );

        Ok(DocumentAnalysis {
            difficulty_score,
            term_density,
            structural_complexity,
            sentence_length_factor,
            recommended_strategy,
            total_tokens,
            estimated_cost_usd,
        })
    }

    /// Density of academic terms and abstract concepts, normalized to [0, 1]
    fn term_density(&self, pages: &[PageText], total_words: usize) -> f64 {
        let mut academic_hits = 0usize;
        let mut abstract_hits = 0usize;

        for page in pages {
            let lower = page.text.to_lowercase();
            for word in lower.split(|c: char| !c.is_alphanumeric()) {
                if word.is_empty() {
                    continue;
                }
                if ACADEMIC_TERMS.contains(&word) {
                    academic_hits += 1;
                }
                if ABSTRACT_CONCEPTS.contains(&word) {
                    abstract_hits += 1;
                }
            }
        }

        let academic_density = academic_hits as f64 / total_words as f64;
        let abstract_density = abstract_hits as f64 / total_words as f64;
        ((academic_density * 10.0).min(1.0) * 0.6 + (abstract_density * 10.0).min(1.0) * 0.4)
            .clamp(0.0, 1.0)
    }

    /// Presence of headings, tables and multi-column layout, in [0, 1]
    fn structural_complexity(&self, pages: &[PageText]) -> f64 {
        let mut heading_pages = 0usize;
        let mut table_pages = 0usize;
        let mut multi_column_pages = 0usize;

        for page in pages {
            let headings = page.layout.heading_count
                + HEADING_RE.find_iter(&page.text).count();
            let tables = page.layout.table_count + TABLE_ROW_RE.find_iter(&page.text).count();

            if headings > 0 {
                heading_pages += 1;
            }
            if tables > 0 {
                table_pages += 1;
            }
            if page.layout.column_count > 1 {
                multi_column_pages += 1;
            }
        }

        let n = pages.len() as f64;
        (heading_pages as f64 / n * 0.4
            + table_pages as f64 / n * 0.4
            + multi_column_pages as f64 / n * 0.2)
            .clamp(0.0, 1.0)
    }

    /// Average words per sentence, normalized so that 20+ words maps to 1.0
    fn sentence_length_factor(&self, pages: &[PageText]) -> f64 {
        let mut sentence_count = 0usize;
        let mut word_count = 0usize;

        for page in pages {
            for sentence in split_sentences(&page.text) {
                sentence_count += 1;
                word_count += sentence.split_whitespace().count();
            }
        }

        if sentence_count == 0 {
            return 0.0;
        }
        let avg = word_count as f64 / sentence_count as f64;
        (avg / 20.0).min(1.0)
    }
}
