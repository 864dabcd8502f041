/*!
 * Error types for the tarjoman pipeline.
 *
 * This module contains custom error types for different parts of the
 * pipeline, using the thiserror crate for ergonomic error definitions.
 *
 * Provider errors carry a transient/permanent classification that the
 * orchestrator uses to decide between retry with backoff and immediate
 * abandonment of a task.
 */

use thiserror::Error;

/// Errors reported by translation providers for a single attempt
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The attempt exceeded its deadline
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The provider rejected the request due to rate limiting (HTTP 429)
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// The provider reported a server-side failure (HTTP 5xx)
    #[error("provider server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The request never reached the provider
    #[error("connection error: {0}")]
    Connection(String),

    /// Authentication with the provider failed (HTTP 401/403)
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider rejected the request as malformed (other HTTP 4xx)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The account quota is exhausted and will not recover by waiting
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The provider response could not be parsed
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// Whether the error is worth retrying with backoff.
    ///
    /// Timeouts, rate limits, server errors and connection failures are
    /// transient; auth failures, malformed requests, hard quota exhaustion
    /// and unparseable responses are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::RateLimited(_)
                | ProviderError::ServerError { .. }
                | ProviderError::Connection(_)
        )
    }

    /// Stable class label used for error summaries in job status snapshots
    pub fn class(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::ServerError { .. } => "server_error",
            ProviderError::Connection(_) => "connection",
            ProviderError::AuthFailed(_) => "auth_failed",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::QuotaExhausted(_) => "quota_exhausted",
            ProviderError::Parse(_) => "parse_error",
        }
    }
}

/// Pipeline-level errors surfaced to callers of the service facade
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Text extraction failed; fatal for the whole document, no job is created
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The document contains no translatable text
    #[error("document is empty")]
    EmptyDocument,

    /// Malformed chunk or options, rejected before dispatch
    #[error("validation error: {0}")]
    Validation(String),

    /// The job's cost budget was exhausted
    #[error("budget exceeded for job {0}")]
    BudgetExceeded(String),

    /// No document with the given id
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// No job with the given id
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// No usable provider is configured
    #[error("no provider available: {0}")]
    NoProvider(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// Error from a provider attempt
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        Self::Store(error.to_string())
    }
}
