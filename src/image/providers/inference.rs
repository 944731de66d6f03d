//! Synchronous inference provider (Hugging Face router).
//!
//! Posts the prompt, waits for the raw image bytes, and returns them as an
//! embedded `data:` payload.

use crate::error::{classify_status, PromptCanvasError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, ImageFormat, ImageProviderKind, ImageRef, ProviderRequest,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co";
const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-schnell";

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "HUGGING_FACE_ACCESS_TOKEN";

/// Builder for InferenceProvider.
#[derive(Debug, Clone)]
pub struct InferenceProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl Default for InferenceProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl InferenceProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the access token. Falls back to `HUGGING_FACE_ACCESS_TOKEN`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the router base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model repository id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builds the provider, resolving the access token.
    pub fn build(self) -> Result<InferenceProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PromptCanvasError::NotConfigured(format!(
                    "{TOKEN_ENV} not set and no access token provided"
                ))
            })?;

        Ok(InferenceProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
        })
    }
}

/// Synchronous text-to-image inference provider.
pub struct InferenceProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl InferenceProvider {
    /// Creates a new `InferenceProviderBuilder`.
    pub fn builder() -> InferenceProviderBuilder {
        InferenceProviderBuilder::new()
    }

    fn endpoint(&self) -> String {
        format!("{}/hf-inference/models/{}", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageProvider for InferenceProvider {
    async fn generate(&self, request: &ProviderRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "image/png")
            .json(&InferenceRequest {
                inputs: &request.prompt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "inference request failed");
            return Err(classify_status(status.as_u16(), &text, &headers));
        }

        let fallback = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(ImageFormat::from_mime)
            .unwrap_or_default();
        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(PromptCanvasError::NoImageProduced(
                "inference endpoint returned an empty body".into(),
            ));
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(bytes = data.len(), duration_ms, "inference complete");

        Ok(GeneratedImage::new(
            ImageRef::from_bytes(&data, fallback),
            ImageProviderKind::Inference,
            GenerationMetadata {
                model: Some(self.model.clone()),
                seed: None,
                duration_ms: Some(duration_ms),
            },
        ))
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Inference
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}
