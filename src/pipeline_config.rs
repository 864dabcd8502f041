use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::models::ChunkStrategy;

/// Pipeline configuration module
/// This module handles configuration for the translation pipeline:
/// provider definitions, per-job settings, analyzer thresholds and
/// worker-pool sizing. There is no ambient global configuration; a
/// `JobConfig` is passed explicitly at submission time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Default translation provider
    #[serde(default)]
    pub provider: ProviderKind,

    /// Provider fallback priority order (after the default)
    #[serde(default = "default_priority")]
    pub priority: Vec<ProviderKind>,

    /// Available provider configurations
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Analyzer thresholds for strategy recommendation
    #[serde(default)]
    pub analyzer: AnalyzerThresholds,

    /// Defaults applied to jobs that do not override them
    #[serde(default)]
    pub job_defaults: JobConfig,
}

/// Translation provider variant
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Networked, metered LLM API
    #[default]
    OnlineLlm,
    /// Local model server, no network, no metering
    LocalModel,
    /// OpenAI-compatible endpoint, independently configured
    CompatibleEndpoint,
}

impl ProviderKind {
    /// Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OnlineLlm => "Online LLM",
            Self::LocalModel => "Local Model",
            Self::CompatibleEndpoint => "Compatible Endpoint",
        }
    }

    /// Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OnlineLlm => "online_llm".to_string(),
            Self::LocalModel => "local_model".to_string(),
            Self::CompatibleEndpoint => "compatible_endpoint".to_string(),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "online_llm" => Ok(Self::OnlineLlm),
            "local_model" => Ok(Self::LocalModel),
            "compatible_endpoint" => Ok(Self::CompatibleEndpoint),
            _ => Err(anyhow!("Invalid provider kind: {}", s)),
        }
    }
}

/// Per-provider configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Provider variant this configuration applies to
    pub kind: ProviderKind,

    /// Model name
    #[serde(default = "String::new")]
    pub model: String,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Max concurrent requests (worker pool size for this provider)
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,

    /// Input token price in USD per 1M tokens
    #[serde(default)]
    pub input_price_per_m: f64,

    /// Output token price in USD per 1M tokens
    #[serde(default)]
    pub output_price_per_m: f64,

    /// Largest chunk the provider accepts, in estimated tokens
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
}

impl ProviderConfig {
    /// Provider config with per-variant defaults
    pub fn new(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OnlineLlm => Self {
                kind,
                model: default_online_model(),
                api_key: String::new(),
                endpoint: default_online_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                timeout_secs: default_timeout_secs(),
                rate_limit: Some(60),
                input_price_per_m: default_input_price_per_m(),
                output_price_per_m: default_output_price_per_m(),
                max_input_tokens: default_max_input_tokens(),
            },
            ProviderKind::LocalModel => Self {
                kind,
                model: default_local_model(),
                api_key: String::new(),
                endpoint: default_local_endpoint(),
                // Local server tolerates higher concurrency, no metering
                concurrent_requests: 8,
                timeout_secs: default_timeout_secs(),
                rate_limit: None,
                input_price_per_m: 0.0,
                output_price_per_m: 0.0,
                max_input_tokens: default_max_input_tokens(),
            },
            ProviderKind::CompatibleEndpoint => Self {
                kind,
                model: default_compatible_model(),
                api_key: String::new(),
                endpoint: default_compatible_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                timeout_secs: default_timeout_secs(),
                rate_limit: None,
                input_price_per_m: 0.0,
                output_price_per_m: 0.0,
                max_input_tokens: default_max_input_tokens(),
            },
        }
    }

    /// Price pair used by the cost ledger
    pub fn unit_price(&self) -> UnitPrice {
        UnitPrice {
            input_per_m: self.input_price_per_m,
            output_per_m: self.output_price_per_m,
        }
    }
}

/// Token pricing in USD per 1M tokens
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnitPrice {
    pub input_per_m: f64,
    pub output_per_m: f64,
}

impl UnitPrice {
    /// Cost of one call given its token usage
    pub fn cost_usd(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        let in_cost = (tokens_in as f64 / 1_000_000.0) * self.input_per_m;
        let out_cost = (tokens_out as f64 / 1_000_000.0) * self.output_per_m;
        in_cost + out_cost
    }
}

/// Difficulty thresholds mapping a score to a chunking strategy.
///
/// The specific numbers are tunable defaults, not load-bearing contracts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AnalyzerThresholds {
    /// Below this difficulty, recommend token-bound chunking
    #[serde(default = "default_token_bound_below")]
    pub token_bound_below: f64,

    /// Above this difficulty, recommend hybrid chunking
    #[serde(default = "default_hybrid_above")]
    pub hybrid_above: f64,

    /// Expected output growth when translating into Persian
    #[serde(default = "default_expansion_factor")]
    pub expansion_factor: f64,
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self {
            token_bound_below: default_token_bound_below(),
            hybrid_above: default_hybrid_above(),
            expansion_factor: default_expansion_factor(),
        }
    }
}

/// Per-job settings passed explicitly at submission time
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Maximum spend authorized for the job in USD
    #[serde(default = "default_budget_cap_usd")]
    pub budget_cap_usd: f64,

    /// Provider override for this job; default routing when absent
    #[serde(default)]
    pub provider_override: Option<ProviderKind>,

    /// Chunking strategy override; analyzer recommendation when absent
    #[serde(default)]
    pub strategy_override: Option<ChunkStrategy>,

    /// Retries per task before terminal abandonment
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fraction of abandoned tasks that fails the whole job
    #[serde(default = "default_failure_tolerance")]
    pub failure_tolerance: f64,

    /// Token ceiling per chunk
    #[serde(default = "default_max_unit_tokens")]
    pub max_unit_tokens: usize,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Base backoff in milliseconds, doubled per retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Quality score below which a chunk needs review
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            budget_cap_usd: default_budget_cap_usd(),
            provider_override: None,
            strategy_override: None,
            max_retries: default_max_retries(),
            failure_tolerance: default_failure_tolerance(),
            max_unit_tokens: default_max_unit_tokens(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            review_threshold: default_review_threshold(),
        }
    }
}

impl JobConfig {
    /// Validate job options before any task is created
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("Target language must not be empty"));
        }
        if self.budget_cap_usd < 0.0 {
            return Err(anyhow!("Budget cap must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.failure_tolerance) {
            return Err(anyhow!("Failure tolerance must be within [0, 1]"));
        }
        if self.max_unit_tokens == 0 {
            return Err(anyhow!("Max unit tokens must be positive"));
        }
        if !(0.0..=1.0).contains(&self.review_threshold) {
            return Err(anyhow!("Review threshold must be within [0, 1]"));
        }
        Ok(())
    }
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_input_tokens() -> usize {
    8192
}

fn default_target_language() -> String {
    "fa".to_string()
}

fn default_budget_cap_usd() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_failure_tolerance() -> f64 {
    0.2
}

fn default_max_unit_tokens() -> usize {
    1200
}

fn default_attempt_timeout_secs() -> u64 {
    60
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_backoff_cap_ms() -> u64 {
    60_000
}

fn default_review_threshold() -> f64 {
    0.8
}

fn default_token_bound_below() -> f64 {
    0.3
}

fn default_hybrid_above() -> f64 {
    0.7
}

fn default_expansion_factor() -> f64 {
    1.2
}

fn default_online_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_compatible_endpoint() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_online_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_local_model() -> String {
    "llama3".to_string()
}

fn default_compatible_model() -> String {
    "local-model".to_string()
}

fn default_priority() -> Vec<ProviderKind> {
    vec![
        ProviderKind::OnlineLlm,
        ProviderKind::CompatibleEndpoint,
        ProviderKind::LocalModel,
    ]
}

fn default_input_price_per_m() -> f64 {
    0.15
}

fn default_output_price_per_m() -> f64 {
    0.60
}

impl PipelineConfig {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim().is_empty() || self.target_language.trim().is_empty() {
            return Err(anyhow!("Source and target languages must be set"));
        }

        // The online provider is metered and requires credentials
        if self.provider == ProviderKind::OnlineLlm {
            let api_key = self.get_api_key();
            if api_key.is_empty() {
                return Err(anyhow!("API key is required for the online LLM provider"));
            }
        }

        self.job_defaults.validate()
    }

    /// Get the active provider configuration from available_providers
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    /// Get a specific provider configuration by kind
    pub fn get_provider_config(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.available_providers.iter().find(|p| p.kind == kind)
    }

    /// Worker pool size for a provider, falling back to the default cap
    pub fn concurrency_for(&self, kind: ProviderKind) -> usize {
        self.get_provider_config(kind)
            .map(|p| p.concurrent_requests)
            .unwrap_or_else(default_concurrent_requests)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            ProviderKind::OnlineLlm => default_online_model(),
            ProviderKind::LocalModel => default_local_model(),
            ProviderKind::CompatibleEndpoint => default_compatible_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        String::new()
    }

    /// Token price for a provider; unmetered providers cost nothing
    pub fn unit_price_for(&self, kind: ProviderKind) -> UnitPrice {
        self.get_provider_config(kind)
            .map(|p| p.unit_price())
            .unwrap_or_default()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut config = Self {
            source_language: "en".to_string(),
            target_language: "fa".to_string(),
            provider: ProviderKind::default(),
            priority: default_priority(),
            available_providers: Vec::new(),
            analyzer: AnalyzerThresholds::default(),
            job_defaults: JobConfig::default(),
        };

        // Add default providers
        config
            .available_providers
            .push(ProviderConfig::new(ProviderKind::OnlineLlm));
        config
            .available_providers
            .push(ProviderConfig::new(ProviderKind::LocalModel));
        config
            .available_providers
            .push(ProviderConfig::new(ProviderKind::CompatibleEndpoint));

        config
    }
}
