//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, ImageProviderKind, ProviderRequest};
use async_trait::async_trait;

/// Trait for image generation providers.
///
/// One implementation is selected at deployment time; callers only ever see
/// `dyn ImageProvider`.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image reference for an already enhanced prompt.
    async fn generate(&self, request: &ProviderRequest) -> Result<GeneratedImage>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ImageProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ImageProviderKind::DirectUrl => "Direct URL (Pollinations)",
            ImageProviderKind::Inference => "Inference (Hugging Face)",
            ImageProviderKind::Chat => "Chat completion (OpenRouter)",
        }
    }

    /// Returns the model identifier sent upstream.
    fn model(&self) -> &str;
}
