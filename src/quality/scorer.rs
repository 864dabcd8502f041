/*!
 * Quality scoring heuristics.
 *
 * Each dimension is computed independently from the original and
 * translated text, then combined through a fixed weighted average.
 * Scoring is a pure function of its inputs; no network calls.
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{QualityLevel, QualityReport};

/// Weights for combining dimension scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityWeights {
    pub adequacy: f64,
    pub fluency: f64,
    pub consistency: f64,
    pub formatting: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            adequacy: 0.35,
            fluency: 0.25,
            consistency: 0.25,
            formatting: 0.15,
        }
    }
}

/// Scores translated chunks across four quality dimensions
#[derive(Debug, Clone)]
pub struct QualityScorer {
    weights: QualityWeights,
    review_threshold: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(QualityWeights::default(), 0.8)
    }
}

impl QualityScorer {
    pub fn new(weights: QualityWeights, review_threshold: f64) -> Self {
        Self {
            weights,
            review_threshold,
        }
    }

    /// Score one translated chunk against its source text
    pub fn score(&self, original: &str, translated: &str) -> QualityReport {
        let adequacy = self.adequacy(original, translated);
        let fluency = self.fluency(translated);
        let consistency = self.consistency(translated);
        let formatting = self.formatting(original, translated);

        let overall_score = adequacy * self.weights.adequacy
            + fluency * self.weights.fluency
            + consistency * self.weights.consistency
            + formatting * self.weights.formatting;

        QualityReport {
            adequacy,
            fluency,
            consistency,
            formatting,
            overall_score,
            needs_review: overall_score < self.review_threshold,
            level: QualityLevel::from_score(overall_score),
            chunks_evaluated: 1,
        }
    }

    /// Aggregate chunk reports into one report (mean of constituents)
    pub fn aggregate(&self, reports: &[QualityReport]) -> QualityReport {
        if reports.is_empty() {
            return QualityReport {
                adequacy: 0.0,
                fluency: 0.0,
                consistency: 0.0,
                formatting: 0.0,
                overall_score: 0.0,
                needs_review: true,
                level: QualityLevel::Poor,
                chunks_evaluated: 0,
            };
        }

        let n = reports.len() as f64;
        let mean = |f: fn(&QualityReport) -> f64| reports.iter().map(f).sum::<f64>() / n;

        let adequacy = mean(|r| r.adequacy);
        let fluency = mean(|r| r.fluency);
        let consistency = mean(|r| r.consistency);
        let formatting = mean(|r| r.formatting);
        let overall_score = mean(|r| r.overall_score);

        QualityReport {
            adequacy,
            fluency,
            consistency,
            formatting,
            overall_score,
            needs_review: overall_score < self.review_threshold,
            level: QualityLevel::from_score(overall_score),
            chunks_evaluated: reports.len(),
        }
    }

    /// Content preservation: length ratio around the expected expansion
    /// plus retention of numbers and capitalized keywords.
    fn adequacy(&self, original: &str, translated: &str) -> f64 {
        if original.is_empty() || translated.is_empty() {
            return 0.0;
        }

        // Translated Persian text tends to run ~1.2x the English length
        let length_ratio = translated.chars().count() as f64 / original.chars().count() as f64;
        let length_score = (1.0 - (length_ratio - 1.2).abs() / 2.0).clamp(0.0, 1.0);

        // Numbers and proper-noun-like tokens should survive translation
        let keywords: Vec<&str> = original
            .split_whitespace()
            .filter(|w| {
                w.chars().any(|c| c.is_numeric())
                    || (w.chars().next().is_some_and(|c| c.is_uppercase()) && w.len() > 3)
            })
            .collect();

        let retention_score = if keywords.is_empty() {
            1.0
        } else {
            let retained = keywords
                .iter()
                .filter(|k| {
                    let stripped: String =
                        k.chars().filter(|c| c.is_alphanumeric()).collect();
                    !stripped.is_empty() && translated.contains(stripped.as_str())
                })
                .count();
            // Keyword survival is a weak signal across scripts; don't let
            // it zero out the dimension.
            0.5 + 0.5 * (retained as f64 / keywords.len() as f64)
        };

        (length_score * 0.4 + retention_score * 0.6).clamp(0.0, 1.0)
    }

    /// Target-language quality: word length, sentence structure and
    /// character diversity heuristics.
    fn fluency(&self, translated: &str) -> f64 {
        let words: Vec<&str> = translated.split_whitespace().collect();
        if words.is_empty() {
            return 0.0;
        }

        let avg_word_length =
            words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
        let word_length_score = (1.0 - (avg_word_length - 5.0).abs() / 10.0).clamp(0.0, 1.0);

        let sentences: Vec<&str> = translated
            .split(['.', '!', '?', '\u{61f}', '\u{6d4}'])
            .collect();
        let proper = sentences.iter().filter(|s| !s.trim().is_empty()).count();
        let sentence_score = (proper as f64 / sentences.len().max(1) as f64).min(1.0);

        let unique_chars = translated
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let diversity_score = (unique_chars as f64 / 30.0).min(1.0);

        (word_length_score * 0.4 + sentence_score * 0.4 + diversity_score * 0.2).clamp(0.0, 1.0)
    }

    /// Terminology agreement: repeated meaningful words indicate the
    /// same term was translated the same way.
    fn consistency(&self, translated: &str) -> f64 {
        let words: Vec<String> = translated
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .map(|w| w.to_string())
            .collect();
        if words.is_empty() {
            return 0.5;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *counts.entry(word.as_str()).or_insert(0) += 1;
        }

        // Vocabulary reuse ratio; saturated so ordinary prose scores well
        let repeated: usize = counts.values().filter(|&&c| c > 1).sum();
        ((repeated as f64 / words.len() as f64) * 3.0 + 0.4).clamp(0.0, 1.0)
    }

    /// Structural marker preservation: paragraph breaks, line breaks and
    /// punctuation counts compared between source and translation.
    fn formatting(&self, original: &str, translated: &str) -> f64 {
        let diff_score = |a: usize, b: usize| -> f64 {
            1.0 - (a as f64 - b as f64).abs() / (a as f64 + 1.0)
        };

        let paragraph_score = diff_score(
            original.matches("\n\n").count(),
            translated.matches("\n\n").count(),
        );
        let line_score = diff_score(
            original.matches('\n').count(),
            translated.matches('\n').count(),
        );

        let punct = |s: &str| {
            s.chars()
                .filter(|c| {
                    matches!(c, '.' | '!' | '?' | ',' | ':' | ';' | '\u{60c}' | '\u{61f}' | '\u{61b}')
                })
                .count()
        };
        let punct_score = diff_score(punct(original), punct(translated));

        (paragraph_score * 0.4 + line_score * 0.3 + punct_score * 0.3).clamp(0.0, 1.0)
    }
}
