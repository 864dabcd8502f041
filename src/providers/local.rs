/*!
 * Local model server provider.
 *
 * Client for a locally hosted model server (Ollama-style generate API).
 * No network egress, no metering; token counts are taken from the
 * server's eval counters when present, best-effort otherwise.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::pipeline_config::{ProviderConfig, ProviderKind};

use super::{Provider, TranslateRequest, TranslationOutcome};

/// Generation request body
#[derive(Debug, Serialize)]
struct GenerationRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct GenerationOptions {
    temperature: f32,
}

/// Generation response body
#[derive(Debug, Deserialize)]
struct GenerationResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Local model server client
#[derive(Debug)]
pub struct LocalModel {
    client: Client,
    base_url: String,
    model: String,
    max_input_tokens: usize,
}

impl LocalModel {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs.max(1) * 2))
                .build()
                .unwrap_or_default(),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_input_tokens: config.max_input_tokens,
        }
    }

    /// Query the server version endpoint as a liveness probe
    async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Provider for LocalModel {
    fn name(&self) -> &str {
        "local_model"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalModel
    }

    fn is_metered(&self) -> bool {
        false
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    async fn translate(
        &self,
        request: &TranslateRequest,
    ) -> Result<TranslationOutcome, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerationRequest {
            model: self.model.clone(),
            prompt: request.text.clone(),
            system: request.system_prompt(),
            stream: false,
            options: GenerationOptions {
                temperature: request.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
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
            error!("Local model server error ({}): {}", status, error_text);
            // A local server has no auth or quota; 4xx means a bad request
            return Err(if status.is_server_error() {
                ProviderError::ServerError {
                    status: status.as_u16(),
                    message: error_text,
                }
            } else {
                ProviderError::InvalidRequest(error_text)
            });
        }

        let parsed = response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        debug!(
            "Local model produced {} chars ({:?} prompt / {:?} eval tokens)",
            parsed.response.len(),
            parsed.prompt_eval_count,
            parsed.eval_count
        );

        Ok(TranslationOutcome {
            text: parsed.response,
            tokens_in: parsed.prompt_eval_count.unwrap_or(0),
            tokens_out: parsed.eval_count.unwrap_or(0),
            provider: self.name().to_string(),
            model: self.model.clone(),
        })
    }

    async fn healthy(&self) -> bool {
        self.version().await.is_ok()
    }
}
