//! Image captioning via a hosted vision model.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Default hosted captioning endpoint (BLIP image-captioning-large).
const DEFAULT_CAPTION_URL: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large";

// Environment variables
pub static CAPTION_API_URL: std::sync::LazyLock<String> = std::sync::LazyLock::new(|| {
    std::env::var("CAPTION_API_URL").unwrap_or_else(|_| DEFAULT_CAPTION_URL.to_string())
});
pub static CAPTION_API_KEY: std::sync::LazyLock<Option<String>> =
    std::sync::LazyLock::new(|| std::env::var("CAPTION_API_KEY").ok());

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption request failed: {0}")]
    Request(String),

    #[error("caption service returned status {0}")]
    Status(u16),

    #[error("caption response missing generated text")]
    EmptyResponse,
}

/// Interface to the external captioning model.
#[async_trait]
pub trait Captioner: Send + Sync {
    async fn caption(&self, image_bytes: &[u8]) -> Result<String, CaptionError>;
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    generated_text: String,
}

/// Captioner backed by a hosted BLIP-style inference endpoint: the image
/// bytes go up as the request body, the caption comes back as
/// `[{"generated_text": ...}]`.
pub struct HttpCaptioner {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCaptioner {
    pub fn new(url: String, api_key: Option<String>) -> Result<Self, CaptionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CaptionError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self, CaptionError> {
        Self::new(CAPTION_API_URL.clone(), CAPTION_API_KEY.clone())
    }
}

#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, image_bytes: &[u8]) -> Result<String, CaptionError> {
        let mut request = self.client.post(&self.url).body(image_bytes.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CaptionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptionError::Status(response.status().as_u16()));
        }

        let captions: Vec<CaptionResponse> = response
            .json()
            .await
            .map_err(|e| CaptionError::Request(e.to_string()))?;

        captions
            .into_iter()
            .map(|c| c.generated_text)
            .find(|text| !text.trim().is_empty())
            .ok_or(CaptionError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_response_parses_hosted_shape() {
        let body = r#"[{"generated_text": "a dog on a beach"}]"#;
        let parsed: Vec<CaptionResponse> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].generated_text, "a dog on a beach");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let captioner =
            HttpCaptioner::new("http://127.0.0.1:1/caption".to_string(), None).unwrap();
        let result = captioner.caption(b"not an image").await;
        assert!(matches!(result, Err(CaptionError::Request(_))));
    }
}
