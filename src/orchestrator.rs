//! Provider orchestration: validate, apply the style, dispatch, normalize.

use crate::config::Config;
use crate::error::{PromptCanvasError, Result};
use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, ImageProviderKind, ProviderRequest};
use crate::style::StyleTable;
use std::sync::Arc;
use std::time::Instant;

/// Server-side boundary between a submission and the configured provider.
///
/// Stateless per call. Holds only the read-only style table and either a
/// provider or the reason none could be configured at startup.
#[derive(Clone)]
pub struct Orchestrator {
    styles: Arc<StyleTable>,
    provider: std::result::Result<Arc<dyn ImageProvider>, Arc<str>>,
    kind: ImageProviderKind,
}

impl Orchestrator {
    /// Creates an orchestrator around a provider.
    pub fn new(styles: Arc<StyleTable>, provider: Arc<dyn ImageProvider>) -> Self {
        let kind = provider.kind();
        Self {
            styles,
            provider: Ok(provider),
            kind,
        }
    }

    /// Creates an orchestrator that answers every call with `NotConfigured`.
    pub fn unconfigured(
        styles: Arc<StyleTable>,
        kind: ImageProviderKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            styles,
            provider: Err(Arc::from(reason.into())),
            kind,
        }
    }

    /// Builds the configured provider, degrading to unconfigured on failure.
    pub fn from_config(config: &Config, styles: Arc<StyleTable>) -> Self {
        match config.build_provider() {
            Ok(provider) => {
                tracing::info!(provider = %config.provider, model = provider.model(), "provider ready");
                Self::new(styles, provider)
            }
            Err(e) => {
                tracing::error!(provider = %config.provider, error = %e, "provider not configured");
                Self::unconfigured(styles, config.provider, e.to_string())
            }
        }
    }

    /// Returns the provider kind selected for this deployment.
    pub fn provider_kind(&self) -> ImageProviderKind {
        self.kind
    }

    /// Returns true if a provider is available.
    pub fn is_configured(&self) -> bool {
        self.provider.is_ok()
    }

    /// Applies the style modifier: `"<prompt>, <modifier>"`.
    pub fn enhance(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = request.validated_prompt()?;
        Ok(self.styles.enhance(prompt, &request.style))
    }

    /// Generates an image for a submission.
    ///
    /// Adds no timeout or retry of its own; the provider call bounds latency.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let enhanced = self.enhance(request)?;

        let provider = match &self.provider {
            Ok(provider) => provider,
            Err(reason) => {
                return Err(PromptCanvasError::NotConfigured(reason.to_string()));
            }
        };

        let style = self.styles.resolve_key(&request.style);
        tracing::debug!(%style, provider = %self.kind, prompt = %enhanced, "dispatching generation");

        let start = Instant::now();
        let result = provider.generate(&ProviderRequest::new(enhanced)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(image) => tracing::info!(
                %style,
                provider = %self.kind,
                duration_ms,
                data = image.image.is_data(),
                "image generated"
            ),
            Err(e) => tracing::warn!(
                %style,
                provider = %self.kind,
                duration_ms,
                kind = %e.kind(),
                error = %e,
                "generation failed"
            ),
        }
        result
    }
}
