/*!
 * Tests for quality levels and review thresholds.
 */

use tarjoman::quality::scorer::{QualityScorer, QualityWeights};
use tarjoman::quality::QualityLevel;

#[test]
fn test_level_boundaries_from_score() {
    assert_eq!(QualityLevel::from_score(0.95), QualityLevel::Excellent);
    assert_eq!(QualityLevel::from_score(0.9), QualityLevel::Excellent);
    assert_eq!(QualityLevel::from_score(0.89), QualityLevel::Good);
    assert_eq!(QualityLevel::from_score(0.7), QualityLevel::Good);
    assert_eq!(QualityLevel::from_score(0.5), QualityLevel::Fair);
    assert_eq!(QualityLevel::from_score(0.1), QualityLevel::Poor);
}

#[test]
fn test_review_threshold_is_configurable() {
    let original = "A plain sentence for scoring purposes. Another follows it here.";
    let translated = "Jomleye sade baraye nomre dadan. Jomleye digari ham hast.";

    let lenient = QualityScorer::new(QualityWeights::default(), 0.0);
    let strict = QualityScorer::new(QualityWeights::default(), 1.0);

    assert!(!lenient.score(original, translated).needs_review);
    assert!(strict.score(original, translated).needs_review);
}

#[test]
fn test_weights_shift_the_overall_score() {
    // Same inputs, weights pushed fully onto one dimension
    let original = "Numbered item 42 appears here.\n\nAnd a second paragraph.";
    let translated = "Item 42 dar inja miayad.\n\nVa paragraph dovom.";

    let all_adequacy = QualityScorer::new(
        QualityWeights {
            adequacy: 1.0,
            fluency: 0.0,
            consistency: 0.0,
            formatting: 0.0,
        },
        0.8,
    );
    let all_formatting = QualityScorer::new(
        QualityWeights {
            adequacy: 0.0,
            fluency: 0.0,
            consistency: 0.0,
            formatting: 1.0,
        },
        0.8,
    );

    let a = all_adequacy.score(original, translated);
    let f = all_formatting.score(original, translated);

    assert!((a.overall_score - a.adequacy).abs() < 1e-9);
    assert!((f.overall_score - f.formatting).abs() < 1e-9);
}

#[test]
fn test_report_summary_mentions_level_and_review() {
    let scorer = QualityScorer::new(QualityWeights::default(), 1.0);
    let report = scorer.score("Source text here.", "Matn dar inja.");

    let summary = report.summary();
    assert!(summary.contains("needs review"));
    assert!(summary.contains("chunk"));
}
