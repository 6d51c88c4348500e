//! Remote embedding client.
//!
//! One HTTP call per text; a batch is a plain sequential loop with a
//! courtesy delay between calls. Every failure mode (timeout, non-200,
//! missing field) collapses to `None`; callers treat "no embedding" as
//! a domain outcome, not an error to propagate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

use docbase_core::EmbeddingConfig;

/// Progress callback for batch embedding: (done, total).
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Embedding generation seam. The remote client is the production
/// implementation; tests substitute deterministic stubs.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. `None` means no embedding could be produced.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Identifier of the model producing the vectors.
    fn model(&self) -> &str;

    /// Embed texts strictly in sequence, reporting progress after each
    /// and pausing `delay` between calls.
    async fn embed_batch(
        &self,
        texts: &[String],
        delay: Duration,
        progress: Option<ProgressFn<'_>>,
    ) -> Vec<Option<Vec<f32>>> {
        let total = texts.len();
        let mut results = Vec::with_capacity(total);
        for (i, text) in texts.iter().enumerate() {
            results.push(self.embed(text).await);
            if let Some(report) = progress {
                report(i + 1, total);
            }
            if i + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        results
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

/// Client for an embeddings endpoint speaking `{model, prompt}` →
/// `{embedding: [...]}`.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl RemoteEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
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
                error!("Embedding request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Embedding API error {}: {}", status, body);
            return None;
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(EmbeddingResponse {
                embedding: Some(vector),
            }) => Some(vector),
            Ok(_) => {
                error!("Embedding response missing the embedding field");
                None
            }
            Err(e) => {
                error!("Embedding response was not valid JSON: {}", e);
                None
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
