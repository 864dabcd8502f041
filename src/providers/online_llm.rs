/*!
 * Online LLM provider.
 *
 * Client for a metered chat-completions API. Performs a single attempt
 * per call and maps HTTP failures onto the transient/permanent error
 * taxonomy; the orchestrator owns retries.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::pipeline_config::{ProviderConfig, ProviderKind};

use super::{Provider, TranslateRequest, TranslationOutcome};

/// Chat message in the request body
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Online LLM chat API client
#[derive(Debug)]
pub struct OnlineLlm {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_input_tokens: usize,
}

impl OnlineLlm {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1) * 2))
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_input_tokens: config.max_input_tokens,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.endpoint.trim_end_matches('/')
        )
    }

    /// Map an HTTP error status onto the provider error taxonomy
    pub(crate) fn classify_status(status: u16, message: String) -> ProviderError {
        match status {
            401 | 403 => ProviderError::AuthFailed(message),
            429 => ProviderError::RateLimited(message),
            402 => ProviderError::QuotaExhausted(message),
            s if s >= 500 => ProviderError::ServerError { status: s, message },
            _ => ProviderError::InvalidRequest(message),
        }
    }

    async fn complete(&self, body: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(0)
                } else {
                    ProviderError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            error!("Online LLM API error ({}): {}", status, error_text);
            return Err(Self::classify_status(status.as_u16(), error_text));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Provider for OnlineLlm {
    fn name(&self) -> &str {
        "online_llm"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OnlineLlm
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslationOutcome, ProviderError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: request.text.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self.complete(&body).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))?;

        let (tokens_in, tokens_out) = response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(TranslationOutcome {
            text: choice.message.content,
            tokens_in,
            tokens_out,
            provider: self.name().to_string(),
            model: self.model.clone(),
        })
    }
}
