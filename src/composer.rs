//! Client-side request composition and the boundaries it submits through.

use crate::error::{ErrorKind, PromptCanvasError, Result};
use crate::image::providers::{nonce, DirectUrlProvider};
use crate::image::{GenerationRequest, ImageProvider, ImageRef, ProviderRequest};
use crate::orchestrator::Orchestrator;
use crate::style::StyleTable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resolution and detail keywords added by standalone composition.
pub const QUALITY_QUALIFIERS: &str = "high quality, 4k, highly detailed";

/// Where prompt enhancement happens. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerMode {
    /// A server-side orchestrator enhances; the composer only validates.
    Delegate,
    /// No server: the composer enhances and builds the image URL itself.
    Standalone,
}

/// Something a composed request can be submitted to.
#[async_trait]
pub trait GenerationBoundary: Send + Sync {
    /// Submits a composed request and returns the image reference.
    async fn submit(&self, request: &GenerationRequest) -> Result<ImageRef>;
}

#[async_trait]
impl GenerationBoundary for Orchestrator {
    async fn submit(&self, request: &GenerationRequest) -> Result<ImageRef> {
        self.generate(request).await.map(|generated| generated.image)
    }
}

/// Successful boundary response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Absolute URL or `data:` payload.
    pub image: String,
}

/// Failed boundary response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error.
    pub error: String,
    /// Upstream detail for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Machine-readable kind. Absent on older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ErrorResponse {
    /// Converts a boundary failure back into a typed error.
    pub fn into_error(self, status: u16) -> PromptCanvasError {
        let kind = self.kind.unwrap_or_else(|| ErrorKind::from_status(status));
        let detail = self.details.unwrap_or_else(|| self.error.clone());
        match kind {
            ErrorKind::InvalidInput => PromptCanvasError::InvalidInput(self.error),
            ErrorKind::NotConfigured => PromptCanvasError::NotConfigured(self.error),
            ErrorKind::RateLimited => PromptCanvasError::RateLimited {
                retry_after: None,
                detail: Some(detail),
            },
            ErrorKind::QuotaExhausted => PromptCanvasError::QuotaExhausted(detail),
            ErrorKind::NoImageProduced => PromptCanvasError::NoImageProduced(self.error),
            ErrorKind::RenderFailure => PromptCanvasError::Render(self.error),
            ErrorKind::ProviderError => PromptCanvasError::Api {
                status,
                message: detail,
            },
        }
    }
}

/// HTTP client for a remote generation boundary.
pub struct RemoteBoundary {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteBoundary {
    /// Creates a client posting to `endpoint` (e.g. `http://host/generate-image`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Replaces the HTTP client.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl GenerationBoundary for RemoteBoundary {
    async fn submit(&self, request: &GenerationRequest) -> Result<ImageRef> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorResponse>(&text).unwrap_or(ErrorResponse {
                error: text,
                details: None,
                kind: None,
            });
            return Err(body.into_error(status.as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        match body.get("image").and_then(|image| image.as_str()) {
            Some(image) if !image.trim().is_empty() => ImageRef::parse(image),
            _ => Err(PromptCanvasError::NoImageProduced(
                "boundary response carried no image".into(),
            )),
        }
    }
}

/// Direct-URL generation with no server in between.
///
/// Expects prompts already enhanced by a standalone [`Composer`].
pub struct StandaloneBoundary {
    provider: DirectUrlProvider,
}

impl StandaloneBoundary {
    /// Creates a boundary around a Direct-URL provider.
    pub fn new(provider: DirectUrlProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl GenerationBoundary for StandaloneBoundary {
    async fn submit(&self, request: &GenerationRequest) -> Result<ImageRef> {
        let prompt = request.validated_prompt()?;
        let generated = self.provider.generate(&ProviderRequest::new(prompt)).await?;
        Ok(generated.image)
    }
}

/// Builds generation requests from raw user input.
#[derive(Debug, Clone)]
pub struct Composer {
    mode: ComposerMode,
    styles: Arc<StyleTable>,
}

impl Composer {
    /// Composer for deployments with a server-side orchestrator.
    pub fn delegating(styles: Arc<StyleTable>) -> Self {
        Self {
            mode: ComposerMode::Delegate,
            styles,
        }
    }

    /// Composer that enhances prompts itself.
    pub fn standalone(styles: Arc<StyleTable>) -> Self {
        Self {
            mode: ComposerMode::Standalone,
            styles,
        }
    }

    /// Returns the fixed composition mode.
    pub fn mode(&self) -> ComposerMode {
        self.mode
    }

    /// Validates and composes a request. Rejects empty prompts before any I/O.
    pub fn compose(&self, raw_prompt: &str, style: &str) -> Result<GenerationRequest> {
        self.compose_with_token(raw_prompt, style, nonce())
    }

    fn compose_with_token(
        &self,
        raw_prompt: &str,
        style: &str,
        token: u64,
    ) -> Result<GenerationRequest> {
        let prompt = raw_prompt.trim();
        if prompt.is_empty() {
            return Err(PromptCanvasError::InvalidInput("empty prompt".into()));
        }

        let prompt = match self.mode {
            ComposerMode::Delegate => prompt.to_string(),
            ComposerMode::Standalone => format!(
                "{}, {QUALITY_QUALIFIERS}, {token}",
                self.styles.enhance(prompt, style)
            ),
        };
        Ok(GenerationRequest::new(prompt).with_style(style))
    }
}

/// A composer paired with the boundary its mode requires.
pub struct ComposerClient {
    composer: Composer,
    boundary: Arc<dyn GenerationBoundary>,
}

impl ComposerClient {
    /// Submits through a server-side boundary (remote or in-process).
    pub fn delegating(styles: Arc<StyleTable>, boundary: Arc<dyn GenerationBoundary>) -> Self {
        Self {
            composer: Composer::delegating(styles),
            boundary,
        }
    }

    /// Builds Direct-URL references locally.
    pub fn standalone(styles: Arc<StyleTable>, provider: DirectUrlProvider) -> Self {
        Self {
            composer: Composer::standalone(styles),
            boundary: Arc::new(StandaloneBoundary::new(provider)),
        }
    }

    /// Returns the composer.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Returns the boundary requests are submitted to.
    pub fn boundary(&self) -> Arc<dyn GenerationBoundary> {
        Arc::clone(&self.boundary)
    }

    /// Composes and submits in one step.
    pub async fn submit(&self, raw_prompt: &str, style: &str) -> Result<ImageRef> {
        let request = self.composer.compose(raw_prompt, style)?;
        self.boundary.submit(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn styles() -> Arc<StyleTable> {
        Arc::new(StyleTable::builtin())
    }

    #[test]
    fn test_compose_rejects_empty_prompt() {
        for composer in [Composer::delegating(styles()), Composer::standalone(styles())] {
            let err = composer.compose("   ", "anime").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            assert_eq!(err.to_string(), "invalid input: empty prompt");
        }
    }

    #[test]
    fn test_delegate_does_not_enhance() {
        let request = Composer::delegating(styles())
            .compose("  a red fox in snow ", "anime")
            .unwrap();
        assert_eq!(request.prompt, "a red fox in snow");
        assert_eq!(request.style, "anime");
    }

    #[test]
    fn test_standalone_enhances_with_qualifiers_and_token() {
        let request = Composer::standalone(styles())
            .compose_with_token("a red fox in snow", "anime", 1700000000123)
            .unwrap();
        assert_eq!(
            request.prompt,
            "a red fox in snow, anime style, manga art, Japanese animation style, \
             high quality, 4k, highly detailed, 1700000000123"
        );
    }

    #[test]
    fn test_standalone_tokens_differ_between_submissions() {
        let composer = Composer::standalone(styles());
        let a = composer.compose_with_token("a fox", "sketch", 1).unwrap();
        let b = composer.compose_with_token("a fox", "sketch", 2).unwrap();
        assert_ne!(a.prompt, b.prompt);
    }

    #[test]
    fn test_error_response_mapping() {
        let rate = ErrorResponse {
            error: "Rate limit exceeded".into(),
            details: Some("429: slow down".into()),
            kind: None,
        }
        .into_error(429);
        assert_eq!(rate.kind(), ErrorKind::RateLimited);
        assert_eq!(rate.provider_detail().as_deref(), Some("429: slow down"));

        let quota = ErrorResponse {
            error: "credits".into(),
            details: None,
            kind: None,
        }
        .into_error(402);
        assert_eq!(quota.kind(), ErrorKind::QuotaExhausted);

        let explicit = ErrorResponse {
            error: "AI service not configured".into(),
            details: None,
            kind: Some(ErrorKind::NotConfigured),
        }
        .into_error(500);
        assert_eq!(explicit.kind(), ErrorKind::NotConfigured);

        let opaque = ErrorResponse {
            error: "boom".into(),
            details: None,
            kind: None,
        }
        .into_error(500);
        assert_eq!(opaque.kind(), ErrorKind::ProviderError);
    }

    #[tokio::test]
    async fn test_standalone_client_builds_url() {
        let provider = DirectUrlProvider::builder().build().unwrap();
        let client = ComposerClient::standalone(styles(), provider);
        assert_eq!(client.composer().mode(), ComposerMode::Standalone);

        let image = client.submit("a red fox in snow", "anime").await.unwrap();
        match image {
            ImageRef::Url(url) => {
                assert!(url.starts_with("https://image.pollinations.ai/prompt/a%20red%20fox"));
                assert!(url.contains("Japanese%20animation%20style"));
                assert!(url.contains("highly%20detailed"));
            }
            other => panic!("expected URL, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_boundary_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/generate-image")
                .json_body(json!({"prompt": "a fox", "style": "anime"}));
            then.status(200)
                .json_body(json!({"image": "data:image/png;base64,AQID"}));
        });

        let boundary: Arc<dyn GenerationBoundary> =
            Arc::new(RemoteBoundary::new(server.url("/generate-image")));
        let client = ComposerClient::delegating(styles(), boundary);
        let image = client.submit(" a fox ", "anime").await.unwrap();

        mock.assert();
        assert!(image.is_data());
    }

    #[tokio::test]
    async fn test_remote_boundary_rate_limited() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/generate-image");
            then.status(429).json_body(json!({
                "error": "Rate limit exceeded by Hugging Face. Please try again later.",
                "details": "429: Too many requests"
            }));
        });

        let boundary = RemoteBoundary::new(server.url("/generate-image"));
        let err = boundary
            .submit(&GenerationRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_remote_boundary_success_without_image() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/generate-image");
            then.status(200).json_body(json!({"result": "nothing"}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/empty-image");
            then.status(200).json_body(json!({"image": ""}));
        });

        for path in ["/generate-image", "/empty-image"] {
            let boundary = RemoteBoundary::new(server.url(path));
            let err = boundary
                .submit(&GenerationRequest::new("a fox"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NoImageProduced, "{path}");
        }
    }

    #[tokio::test]
    async fn test_remote_boundary_non_json_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/generate-image");
            then.status(502).body("Bad Gateway");
        });

        let boundary = RemoteBoundary::new(server.url("/generate-image"));
        let err = boundary
            .submit(&GenerationRequest::new("a fox"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(err.provider_detail().as_deref(), Some("502: Bad Gateway"));
    }

    #[tokio::test]
    async fn test_empty_prompt_skips_network() {
        let boundary: Arc<dyn GenerationBoundary> =
            Arc::new(RemoteBoundary::new("http://127.0.0.1:1/generate-image"));
        let client = ComposerClient::delegating(styles(), boundary);
        let err = client.submit("", "anime").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
