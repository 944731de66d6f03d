//! Chat-completion provider with image output modality (OpenRouter style).

use crate::error::{classify_status, PromptCanvasError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{
    GeneratedImage, GenerationMetadata, ImageProviderKind, ImageRef, ProviderRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image-preview";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Builder for ChatImageProvider.
#[derive(Debug, Clone)]
pub struct ChatImageProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl Default for ChatImageProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ChatImageProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `OPENROUTER_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base URL (without `/chat/completions`).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the multimodal model id.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<ChatImageProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PromptCanvasError::NotConfigured(format!(
                    "{API_KEY_ENV} not set and no API key provided"
                ))
            })?;

        Ok(ChatImageProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model,
        })
    }
}

/// Chat-completion provider that requests image and text modalities.
pub struct ChatImageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatImageProvider {
    /// Creates a new `ChatImageProviderBuilder`.
    pub fn builder() -> ChatImageProviderBuilder {
        ChatImageProviderBuilder::new()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for ChatImageProvider {
    async fn generate(&self, request: &ProviderRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let body = ChatRequest::new(&self.model, &request.prompt);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat completion failed");
            return Err(classify_status(status.as_u16(), &text, &headers));
        }

        let chat_response: ChatResponse = response.json().await?;
        let url = chat_response.first_image_url().ok_or_else(|| {
            PromptCanvasError::NoImageProduced(
                "completion contained no image. The model may have answered with text only."
                    .into(),
            )
        })?;
        let image = ImageRef::parse(url)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, data = image.is_data(), "chat completion produced image");

        Ok(GeneratedImage::new(
            image,
            ImageProviderKind::Chat,
            GenerationMetadata {
                model: Some(self.model.clone()),
                seed: None,
                duration_ms: Some(duration_ms),
            },
        ))
    }

    fn kind(&self) -> ImageProviderKind {
        ImageProviderKind::Chat
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    modalities: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, prompt: &'a str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            modalities: ["image", "text"],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    images: Vec<ChatImage>,
}

#[derive(Debug, Deserialize)]
struct ChatImage {
    #[serde(default)]
    image_url: Option<ChatImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ChatImageUrl {
    url: String,
}

impl ChatResponse {
    fn first_image_url(&self) -> Option<&str> {
        self.choices
            .iter()
            .filter_map(|c| c.message.as_ref())
            .flat_map(|m| m.images.iter())
            .filter_map(|i| i.image_url.as_ref())
            .map(|u| u.url.as_str())
            .find(|u| !u.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn provider(server: &MockServer) -> ChatImageProvider {
        ChatImageProvider::builder()
            .api_key("sk-test")
            .base_url(server.base_url())
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_construction() {
        let body = serde_json::to_value(ChatRequest::new("m", "a fox")).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "messages": [{"role": "user", "content": "a fox"}],
                "modalities": ["image", "text"]
            })
        );
    }

    #[test]
    fn test_first_image_url_skips_text_only_choices() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "thinking"}},
                {"message": {"images": [
                    {"type": "image_url", "image_url": {"url": "https://cdn.example.com/1.png"}},
                    {"type": "image_url", "image_url": {"url": "https://cdn.example.com/2.png"}}
                ]}}
            ]
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_image_url(), Some("https://cdn.example.com/1.png"));
    }

    #[test]
    fn test_first_image_url_none() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"sorry"}}]}"#).unwrap();
        assert_eq!(resp.first_image_url(), None);

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.first_image_url(), None);
    }

    #[tokio::test]
    async fn test_success_extracts_data_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({
                "choices": [{"message": {
                    "content": "Here is your image",
                    "images": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AQID"}}]
                }}]
            }));
        });

        let image = provider(&server)
            .generate(&ProviderRequest::new("a fox"))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(image.image.as_source(), "data:image/png;base64,AQID");
        assert_eq!(image.provider, ImageProviderKind::Chat);
    }

    #[tokio::test]
    async fn test_text_only_response_is_no_image() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .json_body(json!({"choices": [{"message": {"content": "I can't draw that"}}]}));
        });

        let err = provider(&server)
            .generate(&ProviderRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoImageProduced);
    }

    #[tokio::test]
    async fn test_non_image_data_url_is_no_image() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {
                    "images": [{"type": "image_url", "image_url": {"url": "data:text/html;base64,PGgxPmhpPC9oMT4="}}]
                }}]
            }));
        });

        let err = provider(&server)
            .generate(&ProviderRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoImageProduced);
        assert!(err.to_string().contains("text/html"));
    }

    #[tokio::test]
    async fn test_error_status_propagates_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(400).body(r#"{"error":{"message":"bad model"}}"#);
        });

        let err = provider(&server)
            .generate(&ProviderRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(
            err.provider_detail().as_deref(),
            Some(r#"400: {"error":{"message":"bad model"}}"#)
        );
    }

    #[tokio::test]
    async fn test_payment_required_is_quota() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(402).body("insufficient credits");
        });

        let err = provider(&server)
            .generate(&ProviderRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExhausted);
    }
}
