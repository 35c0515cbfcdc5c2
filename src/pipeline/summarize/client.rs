use serde::{Deserialize, Serialize};

use super::SummarizeError;
use crate::config::PipelineConfig;

/// Completion interface for the summarization engine. Implementations are
/// synchronous; the orchestrator owns threading.
pub trait LlmClient: Send + Sync {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, SummarizeError>;
}

/// HTTP client for an Ollama-compatible generate endpoint.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, SummarizeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SummarizeError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, SummarizeError> {
        Self::new(&config.llm_base_url, &config.llm_model, config.llm_timeout_secs)
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, SummarizeError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                SummarizeError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                SummarizeError::Transport(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                SummarizeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SummarizeError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| SummarizeError::Transport(format!("Malformed endpoint response: {e}")))?;

        Ok(parsed.response)
    }
}

/// Mock client for testing. Returns a fixed response or a configured error.
pub struct MockLlmClient {
    response: Result<String, String>,
    retryable: bool,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            retryable: false,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            retryable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            response: Err("connection refused".to_string()),
            retryable: true,
        }
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _system: &str, _prompt: &str) -> Result<String, SummarizeError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(message) if self.retryable => Err(SummarizeError::Connection(message.clone())),
            Err(message) => Err(SummarizeError::Provider {
                status: 500,
                body: message.clone(),
            }),
        }
    }
}
