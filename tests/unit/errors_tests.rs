/*!
 * Tests for the error taxonomy.
 */

use tarjoman::errors::{PipelineError, ProviderError};

#[test]
fn test_transient_errors_should_be_retryable() {
    let transient = [
        ProviderError::Timeout(30),
        ProviderError::RateLimited("429".to_string()),
        ProviderError::ServerError {
            status: 503,
            message: "unavailable".to_string(),
        },
        ProviderError::Connection("refused".to_string()),
    ];
    for error in transient {
        assert!(error.is_transient(), "{} should be transient", error);
    }
}

#[test]
fn test_permanent_errors_should_not_be_retryable() {
    let permanent = [
        ProviderError::AuthFailed("bad key".to_string()),
        ProviderError::InvalidRequest("malformed".to_string()),
        ProviderError::QuotaExhausted("hard limit".to_string()),
        ProviderError::Parse("garbage body".to_string()),
    ];
    for error in permanent {
        assert!(!error.is_transient(), "{} should be permanent", error);
    }
}

#[test]
fn test_error_classes_are_stable_labels() {
    assert_eq!(ProviderError::Timeout(5).class(), "timeout");
    assert_eq!(
        ProviderError::RateLimited(String::new()).class(),
        "rate_limited"
    );
    assert_eq!(
        ProviderError::QuotaExhausted(String::new()).class(),
        "quota_exhausted"
    );
}

#[test]
fn test_provider_error_converts_into_pipeline_error() {
    let error: PipelineError = ProviderError::Timeout(10).into();
    assert!(matches!(error, PipelineError::Provider(_)));
    assert!(error.to_string().contains("timed out"));
}

#[test]
fn test_pipeline_error_messages_name_the_subject() {
    let error = PipelineError::JobNotFound("job-42".to_string());
    assert!(error.to_string().contains("job-42"));

    let error = PipelineError::BudgetExceeded("job-7".to_string());
    assert!(error.to_string().contains("job-7"));
}
