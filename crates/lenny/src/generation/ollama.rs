//! Ollama HTTP client for generation and embeddings

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::invoker::{Invocation, ModelInvoker};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Ollama base URL
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, prompt: text })
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "Embedding failed: HTTP {}",
                response.status()
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        Ok(embed_response.embedding)
    }

    /// Run one non-streaming generation
    ///
    /// A non-2xx reply is reported as an `Invocation` carrying the HTTP status as its
    /// exit code and the body as diagnostics, mirroring a failed process.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: Option<f32>,
        timeout: Duration,
    ) -> Result<Invocation> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: temperature.map(|temperature| GenerateOptions { temperature }),
        };

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(Invocation {
                stdout: String::new(),
                stderr: body,
                exit_code: Some(i32::from(status.as_u16())),
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        Ok(Invocation::success(generated.response))
    }
}

fn map_request_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        Error::invocation(format!("Generation request failed: {}", err))
    }
}

/// Model invoker backed by the Ollama HTTP API
pub struct OllamaInvoker {
    client: OllamaClient,
    model: String,
    temperature: Option<f32>,
}

impl OllamaInvoker {
    /// Create an invoker from LLM configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: OllamaClient::new(&config.base_url)?,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ModelInvoker for OllamaInvoker {
    async fn invoke(&self, prompt: &str, timeout: Duration) -> Result<Invocation> {
        tracing::debug!("Generating with Ollama model: {}", self.model);
        self.client
            .generate(&self.model, prompt, self.temperature, timeout)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama-http"
    }
}
