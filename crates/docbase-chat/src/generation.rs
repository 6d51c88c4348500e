//! Remote generation client.
//!
//! One non-streaming call per chat turn. The same failure taxonomy as
//! the embedding client: timeout, non-200, and malformed responses all
//! come back as `None`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use docbase_core::GenerationConfig;

/// A completed generation: the answer text plus reported token usage.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub content: String,
    pub tokens_used: i64,
}

/// Generation seam; tests substitute deterministic stubs.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt. `None` means the remote call
    /// failed and the turn should be abandoned.
    async fn generate(&self, prompt: &str) -> Option<GenerationOutput>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: i64,
    #[serde(default)]
    prompt_eval_count: i64,
}

/// Client for a generate endpoint speaking
/// `{model, prompt, stream, options}` → `{response, eval_count, prompt_eval_count}`.
pub struct RemoteGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    temperature: f64,
    max_tokens: u32,
}

impl RemoteGenerator {
    pub fn new(cfg: &GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for RemoteGenerator {
    async fn generate(&self, prompt: &str) -> Option<GenerationOutput> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: json!({
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            }),
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Generation request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Generation API error {}: {}", status, body);
            return None;
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => Some(GenerationOutput {
                content: parsed.response,
                tokens_used: parsed.eval_count + parsed.prompt_eval_count,
            }),
            Err(e) => {
                error!("Generation response was not valid JSON: {}", e);
                None
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_none() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let cfg = GenerationConfig {
            endpoint: format!("http://127.0.0.1:{}/api/generate", port),
            timeout_secs: 2,
            ..Default::default()
        };
        let generator = RemoteGenerator::new(&cfg);
        assert!(generator.generate("hello").await.is_none());
    }
}
