//! Remote vision-OCR client.
//!
//! Structurally the same one-shot call pattern as the embedding and
//! generation clients: image bytes go out base64-encoded, text comes
//! back, and every failure mode maps to `None`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use docbase_core::OcrConfig;

const OCR_PROMPT: &str = "Extract all text from this image, maintaining original formatting:";

/// OCR seam; tests substitute deterministic stubs.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Recognize text in one image. `None` means the remote call failed;
    /// an empty string means the call worked but found nothing.
    async fn recognize(&self, image: &[u8]) -> Option<String>;

    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    options: serde_json::Value,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    response: String,
}

/// Client for a vision endpoint speaking
/// `{model, prompt, images, stream, options}` → `{response}`.
pub struct RemoteOcr {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl RemoteOcr {
    pub fn new(cfg: &OcrConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

#[async_trait]
impl OcrClient for RemoteOcr {
    async fn recognize(&self, image: &[u8]) -> Option<String> {
        let request = OcrRequest {
            model: &self.model,
            prompt: OCR_PROMPT,
            images: vec![BASE64.encode(image)],
            stream: false,
            options: json!({
                "temperature": 0.1,
                "num_predict": 4000,
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
                error!("OCR request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("OCR API error {}: {}", status, body);
            return None;
        }

        match response.json::<OcrResponse>().await {
            Ok(parsed) => Some(parsed.response.trim().to_string()),
            Err(e) => {
                error!("OCR response was not valid JSON: {}", e);
                None
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
