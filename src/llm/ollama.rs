//! Ollama-backed responder.
//!
//! Talks to a local or remote Ollama server:
//! - Check whether the server is reachable via `GET /api/version`.
//! - Generate replies via `POST /api/generate` with `stream: false`.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::responder::{ReplyRequest, Responder, ResponderError, ResponderFuture};
use crate::sync::core::config::ResponderConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_NUM_PREDICT: usize = 32;

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
    temperature: f64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Async Ollama client implementing [`Responder`].
pub struct OllamaResponder {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_prompt_chars: usize,
}

impl OllamaResponder {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ResponderConfig, max_prompt_chars: usize) -> Result<Self, ResponderError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ResponderError::Network(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_prompt_chars,
        })
    }

    /// Whether the server answers `GET /api/version`.
    pub async fn is_ready(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(%err, "Ollama not reachable");
                false
            }
        }
    }

    async fn post_generate(&self, request: ReplyRequest) -> Result<String, ResponderError> {
        let prompt = request.prompt(self.max_prompt_chars);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: (request.max_chars / 3).max(MIN_NUM_PREDICT),
                temperature: self.temperature,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ResponderError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Ollama returned an error status");
            return Err(ResponderError::Upstream {
                status: status.as_u16(),
            });
        }

        let parsed = response
            .json::<GenerateResponse>()
            .await
            .map_err(|_| ResponderError::MalformedResponse)?;

        parsed
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or(ResponderError::MalformedResponse)
    }
}

impl Responder for OllamaResponder {
    fn respond(&self, request: ReplyRequest) -> ResponderFuture<'_> {
        Box::pin(self.post_generate(request))
    }
}
