/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::transient_then_succeed(n)` - Times out n times per
 *   chunk before succeeding
 * - `MockProvider::permanent_failure()` - Always fails permanently
 * - `MockProvider::permanent_for_marked(marker)` - Fails permanently for
 *   chunks containing a marker substring
 * - `MockProvider::slow(ms)` - Delays before responding, for timeout tests
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chunker::estimate_tokens;
use crate::errors::ProviderError;
use crate::pipeline_config::ProviderKind;

use super::{PartialStream, Provider, TranslateRequest, TranslationOutcome};

/// Behavior mode for the mock provider
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always succeeds with a marked translation
    Working,
    /// Fails with a timeout the first `failures` attempts per chunk,
    /// then succeeds
    TransientThenSucceed { failures: usize },
    /// Always fails with a transient server error
    AlwaysTransient,
    /// Always fails with a permanent auth error
    PermanentFailure,
    /// Fails permanently for chunks whose text contains the marker
    PermanentForMarked { marker: String },
    /// Sleeps before responding (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing orchestration behavior
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    kind: ProviderKind,
    /// Total calls across all chunks
    call_count: Arc<AtomicUsize>,
    /// Per-chunk attempt counters for transient scripting
    attempts: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            kind: ProviderKind::CompatibleEndpoint,
            call_count: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that times out `failures` times per chunk then succeeds
    pub fn transient_then_succeed(failures: usize) -> Self {
        Self::new(MockBehavior::TransientThenSucceed { failures })
    }

    /// Create a mock that always fails transiently
    pub fn always_transient() -> Self {
        Self::new(MockBehavior::AlwaysTransient)
    }

    /// Create a mock that always fails permanently
    pub fn permanent_failure() -> Self {
        Self::new(MockBehavior::PermanentFailure)
    }

    /// Create a mock that fails permanently for marked chunks
    pub fn permanent_for_marked(marker: impl Into<String>) -> Self {
        Self::new(MockBehavior::PermanentForMarked {
            marker: marker.into(),
        })
    }

    /// Create a slow mock for timeout testing
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Pretend the mock is a different configured variant
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Total number of translate calls observed
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn success(&self, request: &TranslateRequest) -> TranslationOutcome {
        let text = format!("[{}] {}", request.target_language.to_uppercase(), request.text);
        TranslationOutcome {
            tokens_in: estimate_tokens(&request.text) as u64,
            tokens_out: estimate_tokens(&text) as u64,
            text,
            provider: self.name().to_string(),
            model: "mock-model".to_string(),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslationOutcome, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Working => Ok(self.success(request)),
            MockBehavior::TransientThenSucceed { failures } => {
                let attempt = {
                    let mut attempts = self.attempts.lock();
                    let counter = attempts.entry(request.text.clone()).or_insert(0);
                    *counter += 1;
                    *counter
                };
                if attempt <= *failures {
                    Err(ProviderError::Timeout(60))
                } else {
                    Ok(self.success(request))
                }
            }
            MockBehavior::AlwaysTransient => Err(ProviderError::ServerError {
                status: 503,
                message: "mock server overloaded".to_string(),
            }),
            MockBehavior::PermanentFailure => {
                Err(ProviderError::AuthFailed("mock credentials rejected".to_string()))
            }
            MockBehavior::PermanentForMarked { marker } => {
                if request.text.contains(marker.as_str()) {
                    Err(ProviderError::InvalidRequest(format!(
                        "mock rejects chunks containing {:?}",
                        marker
                    )))
                } else {
                    Ok(self.success(request))
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(self.success(request))
            }
        }
    }

    async fn translate_stream(
        &self,
        request: &TranslateRequest,
    ) -> Result<PartialStream, ProviderError> {
        let outcome = self.translate(request).await?;
        let words: Vec<String> = outcome
            .text
            .split_inclusive(' ')
            .map(|w| w.to_string())
            .collect();
        Ok(Box::pin(futures::stream::iter(
            words.into_iter().map(Ok),
        )))
    }
}
