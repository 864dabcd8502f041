/*!
 * OpenAI-compatible endpoint provider.
 *
 * Speaks the same chat-completions wire format as the online provider
 * but is configured independently (endpoint, optional key, model) and
 * tolerates backends that omit usage accounting.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chunker::estimate_tokens;
use crate::errors::ProviderError;
use crate::pipeline_config::{ProviderConfig, ProviderKind};

use super::online_llm::OnlineLlm;
use super::{Provider, TranslateRequest, TranslationOutcome};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
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
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI-compatible endpoint client
#[derive(Debug)]
pub struct CompatibleEndpoint {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_input_tokens: usize,
}

impl CompatibleEndpoint {
    pub fn from_config(config: &ProviderConfig) -> Self {
        // Compatible servers often run without authentication; use a
        // placeholder key when none is configured.
        let api_key = if config.api_key.is_empty() {
            "not-needed".to_string()
        } else {
            config.api_key.clone()
        };

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1) * 2))
                .build()
                .unwrap_or_default(),
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_input_tokens: config.max_input_tokens,
        }
    }
}

#[async_trait]
impl Provider for CompatibleEndpoint {
    fn name(&self) -> &str {
        "compatible_endpoint"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::CompatibleEndpoint
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslationOutcome, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
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

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
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
            error!("Compatible endpoint error ({}): {}", status, error_text);
            return Err(OnlineLlm::classify_status(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))?;

        // Fall back to estimated counts when the backend omits usage
        let (tokens_in, tokens_out) = match parsed.usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens),
            None => (
                estimate_tokens(&request.text) as u64,
                estimate_tokens(&choice.message.content) as u64,
            ),
        };

        Ok(TranslationOutcome {
            text: choice.message.content,
            tokens_in,
            tokens_out,
            provider: self.name().to_string(),
            model: self.model.clone(),
        })
    }
}
