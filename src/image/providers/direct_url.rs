//! Direct-URL provider: the image is generated when the URL is fetched.
//!
//! No network call is made here. The returned URL embeds the enhanced prompt
//! and generation parameters; latency moves to whatever loads it.

use crate::error::{PromptCanvasError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, ImageProviderKind, ImageRef, ProviderRequest,
};
use async_trait::async_trait;
use reqwest::Url;
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai";
const DEFAULT_MODEL: &str = "flux";
const DEFAULT_SIZE: u32 = 1024;

/// Millisecond timestamp used as a cache-busting nonce.
pub(crate) fn nonce() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Builder for DirectUrlProvider.
#[derive(Debug, Clone)]
pub struct DirectUrlProviderBuilder {
    base_url: String,
    model: String,
    width: u32,
    height: u32,
}

impl Default for DirectUrlProviderBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
        }
    }
}

impl DirectUrlProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL the prompt path is appended to.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the output dimensions.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Builds the provider, validating the base URL.
    pub fn build(self) -> Result<DirectUrlProvider> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            PromptCanvasError::NotConfigured(format!("invalid base URL {}: {e}", self.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PromptCanvasError::NotConfigured(format!(
                "base URL {} cannot carry a path",
                self.base_url
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PromptCanvasError::NotConfigured(
                "image dimensions must be non-zero".into(),
            ));
        }

        Ok(DirectUrlProvider {
            base_url,
            model: self.model,
            width: self.width,
            height: self.height,
        })
    }
}

/// Provider that builds a deterministic, percent-encoded image URL.
#[derive(Debug, Clone)]
pub struct DirectUrlProvider {
    base_url: Url,
    model: String,
    width: u32,
    height: u32,
}

impl DirectUrlProvider {
    /// Creates a new `DirectUrlProviderBuilder`.
    pub fn builder() -> DirectUrlProviderBuilder {
        DirectUrlProviderBuilder::new()
    }

    /// Builds the image URL for a prompt and seed. Same inputs, same URL.
    pub fn image_url(&self, prompt: &str, seed: u64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("prompt").push(prompt);
        }
        url.query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("width", &self.width.to_string())
            .append_pair("height", &self.height.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true");
        url
    }
}

#[async_trait]
impl ImageProvider for DirectUrlProvider {
    async fn generate(&self, request: &ProviderRequest) -> Result<GeneratedImage> {
        let seed = request.seed.unwrap_or_else(nonce);
        let url = self.image_url(&request.prompt, seed);
        tracing::debug!(seed, "built direct image URL");

        Ok(GeneratedImage::new(
            ImageRef::Url(url.into()),
            ImageProviderKind::DirectUrl,
            GenerationMetadata {
                model: Some(self.model.clone()),
                seed: Some(seed),
                duration_ms: Some(0),
            },
        ))
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::DirectUrl
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_is_percent_encoded() {
        let provider = DirectUrlProvider::builder().build().unwrap();
        let url = provider.image_url("a red fox in snow, anime style", 42);
        assert_eq!(
            url.as_str(),
            "https://image.pollinations.ai/prompt/a%20red%20fox%20in%20snow,%20anime%20style\
             ?model=flux&width=1024&height=1024&seed=42&nologo=true"
        );
    }

    #[test]
    fn test_slashes_in_prompt_stay_in_one_segment() {
        let provider = DirectUrlProvider::builder().build().unwrap();
        let url = provider.image_url("black/white cat?", 1);
        assert!(url.path().ends_with("/prompt/black%2Fwhite%20cat%3F"));
        assert_eq!(url.query_pairs().count(), 5);
    }

    #[test]
    fn test_url_is_deterministic() {
        let provider = DirectUrlProvider::builder()
            .model("turbo")
            .size(512, 768)
            .build()
            .unwrap();
        let a = provider.image_url("a lighthouse", 7);
        let b = provider.image_url("a lighthouse", 7);
        assert_eq!(a, b);
        assert!(a.as_str().contains("model=turbo&width=512&height=768&seed=7"));
    }

    #[test]
    fn test_base_url_with_path() {
        let provider = DirectUrlProvider::builder()
            .base_url("http://localhost:9000/api/")
            .build()
            .unwrap();
        let url = provider.image_url("x", 1);
        assert!(url.as_str().starts_with("http://localhost:9000/api/prompt/x?"));
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        assert!(DirectUrlProvider::builder().base_url("not a url").build().is_err());
        assert!(DirectUrlProvider::builder()
            .base_url("mailto:someone@example.com")
            .build()
            .is_err());
        assert!(DirectUrlProvider::builder().size(0, 10).build().is_err());
    }

    #[tokio::test]
    async fn test_generate_returns_url_without_io() {
        let provider = DirectUrlProvider::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let image = provider
            .generate(&ProviderRequest::new("a fox").with_seed(3))
            .await
            .unwrap();

        assert_eq!(image.provider, ImageProviderKind::DirectUrl);
        assert_eq!(provider.name(), "Direct URL (Pollinations)");
        assert_eq!(image.metadata.seed, Some(3));
        match image.image {
            ImageRef::Url(url) => assert!(url.contains("seed=3")),
            other => panic!("expected URL, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_without_seed_uses_nonce() {
        let provider = DirectUrlProvider::builder().build().unwrap();
        let image = provider.generate(&ProviderRequest::new("a fox")).await.unwrap();
        assert!(image.metadata.seed.unwrap_or_default() > 0);
    }
}
