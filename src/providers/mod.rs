/*!
 * Provider implementations for different translation backends.
 *
 * This module contains client implementations for the interchangeable
 * translation providers:
 * - online_llm: Online LLM chat API (metered, rate limited)
 * - local: Local model server (offline, unmetered)
 * - compatible: OpenAI-compatible endpoint (independently configured)
 *
 * Providers perform exactly one attempt per call and classify failures
 * as transient or permanent; retry and backoff policy lives in the
 * orchestrator, never inside a provider.
 */

use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;

use crate::errors::ProviderError;
use crate::pipeline_config::ProviderKind;

pub mod compatible;
pub mod local;
pub mod mock;
pub mod online_llm;
pub mod router;

/// Incremental partial translations for streaming consumers
pub type PartialStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// One chunk translation request
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    /// Source text of the chunk
    pub text: String,
    /// Source language code (ISO)
    pub source_language: String,
    /// Target language code (ISO)
    pub target_language: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token ceiling
    pub max_tokens: u32,
}

impl TranslateRequest {
    pub fn new(
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            temperature: 0.3,
            max_tokens: 4096,
        }
    }

    /// System prompt shared by the chat-style providers
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a professional translator. Translate the following text from {} to {}. \
             Preserve all formatting, line breaks, and special characters. \
             Only respond with the translated text, without any explanations or notes.",
            self.source_language, self.target_language
        )
    }
}

/// Result of one successful translation attempt
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// The translated text
    pub text: String,
    /// Prompt tokens consumed (0 when the backend does not report usage)
    pub tokens_in: u64,
    /// Completion tokens produced
    pub tokens_out: u64,
    /// Name of the provider that produced the result
    pub provider: String,
    /// Model that produced the result
    pub model: String,
}

/// Common trait for all translation providers.
///
/// Implementations must be interchangeable: the orchestrator only ever
/// sees `Arc<dyn Provider>` values handed out by the router and never
/// inspects concrete types.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Stable provider name used in task records and failure history
    fn name(&self) -> &str;

    /// Which configured variant this provider is
    fn kind(&self) -> ProviderKind;

    /// Whether calls to this provider are metered (cost money)
    fn is_metered(&self) -> bool {
        true
    }

    /// Largest chunk this provider accepts, in estimated tokens
    fn max_input_tokens(&self) -> usize {
        8192
    }

    /// Translate one chunk. Exactly one attempt; errors carry their
    /// transient/permanent classification.
    async fn translate(&self, request: &TranslateRequest)
        -> Result<TranslationOutcome, ProviderError>;

    /// Translate one chunk, yielding partial strings as they arrive.
    ///
    /// The default implementation performs a blocking translate and
    /// yields the full text once; backends with native streaming
    /// override this.
    async fn translate_stream(
        &self,
        request: &TranslateRequest,
    ) -> Result<PartialStream, ProviderError> {
        let outcome = self.translate(request).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(outcome.text)
        })))
    }

    /// Lightweight availability probe; defaults to available
    async fn healthy(&self) -> bool {
        true
    }
}
