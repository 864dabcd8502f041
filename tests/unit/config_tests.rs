/*!
 * Tests for pipeline and job configuration.
 */

use tarjoman::models::ChunkStrategy;
use tarjoman::pipeline_config::{JobConfig, PipelineConfig, ProviderConfig, ProviderKind};

#[test]
fn test_minimal_json_should_deserialize_with_defaults() {
    let json = r#"{
        "source_language": "en",
        "target_language": "fa"
    }"#;
    let config: PipelineConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.provider, ProviderKind::OnlineLlm);
    assert_eq!(config.job_defaults.max_retries, 3);
    assert_eq!(config.job_defaults.max_unit_tokens, 1200);
    assert!((config.job_defaults.failure_tolerance - 0.2).abs() < 1e-9);
    assert!((config.analyzer.expansion_factor - 1.2).abs() < 1e-9);
}

#[test]
fn test_job_config_json_overrides_should_apply() {
    let json = r#"{
        "target_language": "de",
        "budget_cap_usd": 2.5,
        "strategy_override": "hybrid",
        "provider_override": "local_model"
    }"#;
    let config: JobConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.target_language, "de");
    assert!((config.budget_cap_usd - 2.5).abs() < 1e-9);
    assert_eq!(config.strategy_override, Some(ChunkStrategy::Hybrid));
    assert_eq!(config.provider_override, Some(ProviderKind::LocalModel));
}

#[test]
fn test_validate_online_provider_requires_api_key() {
    let mut config = PipelineConfig::default();
    assert!(config.validate().is_err());

    if let Some(provider) = config
        .available_providers
        .iter_mut()
        .find(|p| p.kind == ProviderKind::OnlineLlm)
    {
        provider.api_key = "sk-test".to_string();
    }
    assert!(config.validate().is_ok());
}

#[test]
fn test_local_provider_needs_no_credentials() {
    let mut config = PipelineConfig::default();
    config.provider = ProviderKind::LocalModel;
    assert!(config.validate().is_ok());
}

#[test]
fn test_provider_defaults_differ_per_kind() {
    let local = ProviderConfig::new(ProviderKind::LocalModel);
    let online = ProviderConfig::new(ProviderKind::OnlineLlm);

    assert_eq!(local.input_price_per_m, 0.0);
    assert!(online.input_price_per_m > 0.0);
    assert!(local.concurrent_requests > online.concurrent_requests);
    assert!(local.endpoint.contains("localhost"));
}

#[test]
fn test_job_config_validation_bounds() {
    let negative_budget = JobConfig {
        budget_cap_usd: -1.0,
        ..JobConfig::default()
    };
    assert!(negative_budget.validate().is_err());

    let empty_language = JobConfig {
        target_language: "  ".to_string(),
        ..JobConfig::default()
    };
    assert!(empty_language.validate().is_err());

    let zero_ceiling = JobConfig {
        max_unit_tokens: 0,
        ..JobConfig::default()
    };
    assert!(zero_ceiling.validate().is_err());

    assert!(JobConfig::default().validate().is_ok());
}
