/*!
 * Tests for document analysis through the public API.
 */

use tarjoman::analyzer::DocumentAnalyzer;
use tarjoman::models::{ChunkStrategy, PageText};
use tarjoman::pipeline_config::{AnalyzerThresholds, UnitPrice};

fn price() -> UnitPrice {
    UnitPrice {
        input_per_m: 1.0,
        output_per_m: 2.0,
    }
}

#[test]
fn test_thresholds_should_steer_strategy_recommendation() {
    let pages = vec![PageText::new(
        1,
        "A middling document with several ordinary sentences. They are neither \
         short nor long. The vocabulary stays plain throughout the page.",
    )];

    // Force every difficulty into the hybrid band
    let hybrid_all = AnalyzerThresholds {
        token_bound_below: 0.0,
        hybrid_above: 0.0,
        ..AnalyzerThresholds::default()
    };
    let analysis = DocumentAnalyzer::new(hybrid_all, price())
        .analyze(&pages)
        .unwrap();
    assert_eq!(analysis.recommended_strategy, ChunkStrategy::Hybrid);

    // Force everything below the token-bound cutoff
    let token_bound_all = AnalyzerThresholds {
        token_bound_below: 1.0,
        hybrid_above: 1.0,
        ..AnalyzerThresholds::default()
    };
    let analysis = DocumentAnalyzer::new(token_bound_all, price())
        .analyze(&pages)
        .unwrap();
    assert_eq!(analysis.recommended_strategy, ChunkStrategy::TokenBound);
}

#[test]
fn test_expansion_factor_should_scale_cost_estimate() {
    let pages = vec![PageText::new(
        1,
        "A body of text long enough to carry a measurable token count for \
         the purposes of estimating translation cost.",
    )];

    let narrow = AnalyzerThresholds {
        expansion_factor: 1.0,
        ..AnalyzerThresholds::default()
    };
    let wide = AnalyzerThresholds {
        expansion_factor: 2.0,
        ..AnalyzerThresholds::default()
    };

    let cheap = DocumentAnalyzer::new(narrow, price()).analyze(&pages).unwrap();
    let dear = DocumentAnalyzer::new(wide, price()).analyze(&pages).unwrap();

    assert_eq!(cheap.total_tokens, dear.total_tokens);
    assert!(dear.estimated_cost_usd > cheap.estimated_cost_usd);
}

#[test]
fn test_sub_scores_should_stay_normalized() {
    let pages = vec![PageText::new(
        1,
        "1. INTRODUCTION\n\nThe phenomenology of consciousness and the \
         hermeneutics of being dominate this discourse. | col | col |\n\
         Existence precedes essence in the analysis of subjectivity.",
    )];
    let analysis = DocumentAnalyzer::new(AnalyzerThresholds::default(), price())
        .analyze(&pages)
        .unwrap();

    for score in [
        analysis.difficulty_score,
        analysis.term_density,
        analysis.structural_complexity,
        analysis.sentence_length_factor,
    ] {
        assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
    }
}

#[test]
fn test_analysis_is_deterministic() {
    let pages = vec![PageText::new(
        1,
        "Deterministic inputs must produce deterministic analysis output.",
    )];
    let analyzer = DocumentAnalyzer::new(AnalyzerThresholds::default(), price());
    let a = analyzer.analyze(&pages).unwrap();
    let b = analyzer.analyze(&pages).unwrap();

    assert_eq!(a.difficulty_score, b.difficulty_score);
    assert_eq!(a.total_tokens, b.total_tokens);
    assert_eq!(a.recommended_strategy, b.recommended_strategy);
}
