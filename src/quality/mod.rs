/*!
 * Translation quality assessment.
 *
 * Provides multi-dimensional scoring of completed chunk translations:
 * - Adequacy: content preservation (length ratio, keyword retention)
 * - Fluency: target language quality heuristics
 * - Consistency: terminology agreement within the text
 * - Formatting: structural marker preservation
 */

pub mod scorer;

pub use scorer::{QualityScorer, QualityWeights};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse quality label derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => QualityLevel::Excellent,
            s if s >= 0.7 => QualityLevel::Good,
            s if s >= 0.5 => QualityLevel::Fair,
            _ => QualityLevel::Poor,
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLevel::Excellent => write!(f, "excellent"),
            QualityLevel::Good => write!(f, "good"),
            QualityLevel::Fair => write!(f, "fair"),
            QualityLevel::Poor => write!(f, "poor"),
        }
    }
}

/// Quality report for a chunk, or aggregated per job.
/// Every dimension is in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub adequacy: f64,
    pub fluency: f64,
    pub consistency: f64,
    pub formatting: f64,
    /// Weighted mean of the four dimensions
    pub overall_score: f64,
    pub needs_review: bool,
    pub level: QualityLevel,
    /// Number of chunk reports aggregated into this one (1 for a
    /// single-chunk report)
    pub chunks_evaluated: usize,
}

impl QualityReport {
    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Quality: {:.1}% ({}) - {} chunk(s){}",
            self.overall_score * 100.0,
            self.level,
            self.chunks_evaluated,
            if self.needs_review {
                ", needs review"
            } else {
                ""
            }
        )
    }
}
