//! Core types for image generation.

use crate::error::{PromptCanvasError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Supported image formats for embedded payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parses a MIME type, ignoring parameters such as `charset`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageProviderKind {
    /// Builds a fetchable URL; generation happens when the URL is loaded.
    DirectUrl,
    /// Synchronous text-to-image inference returning raw bytes.
    Inference,
    /// Chat completion endpoint with image output modality.
    Chat,
}

impl ImageProviderKind {
    /// All provider kinds.
    pub const ALL: [ImageProviderKind; 3] = [Self::DirectUrl, Self::Inference, Self::Chat];

    /// Returns the configuration identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectUrl => "direct-url",
            Self::Inference => "inference",
            Self::Chat => "chat",
        }
    }

    /// Parses a configuration identifier.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for ImageProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user submission: raw prompt plus style key.
///
/// Serialized as `{"prompt": ..., "style": ...}` on the generation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Style key; unknown keys resolve to the default style.
    ///
    /// `null` and non-string values deserialize as an empty (unknown) key.
    #[serde(default, deserialize_with = "lenient_style")]
    pub style: String,
}

fn lenient_style<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(style)) => style,
        _ => String::new(),
    })
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and the default style.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: crate::style::StyleKey::default().as_str().to_string(),
        }
    }

    /// Sets the style key.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    /// Returns the trimmed prompt, or `InvalidInput` when it is empty.
    pub fn validated_prompt(&self) -> Result<&str> {
        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            return Err(PromptCanvasError::InvalidInput("empty prompt".into()));
        }
        Ok(prompt)
    }
}

/// What a provider receives: the fully enhanced prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    /// Enhanced prompt, style modifier already applied.
    pub prompt: String,
    /// Seed for providers that accept one.
    pub seed: Option<u64>,
}

impl ProviderRequest {
    /// Creates a new provider request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: None,
        }
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Opaque reference to a generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Remotely fetchable URL.
    Url(String),
    /// Self-contained base64 payload.
    Data {
        /// MIME type, e.g. `image/png`.
        mime: String,
        /// Base64 (standard alphabet) image bytes.
        base64: String,
    },
}

impl ImageRef {
    /// Encodes raw image bytes, labelling them from magic bytes or `fallback`.
    pub fn from_bytes(data: &[u8], fallback: ImageFormat) -> Self {
        let format = ImageFormat::from_magic_bytes(data).unwrap_or(fallback);
        Self::Data {
            mime: format.mime_type().to_string(),
            base64: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }

    /// Parses a source string: an absolute http(s) URL or a `data:` payload.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if let Some(rest) = source.strip_prefix("data:") {
            let (mime, payload) = rest.split_once(";base64,").ok_or_else(|| {
                PromptCanvasError::NoImageProduced("data payload is not base64 encoded".into())
            })?;
            if !mime.starts_with("image/") {
                return Err(PromptCanvasError::NoImageProduced(format!(
                    "data payload is {mime}, not an image"
                )));
            }
            if payload.is_empty() {
                return Err(PromptCanvasError::NoImageProduced(
                    "data payload is empty".into(),
                ));
            }
            return Ok(Self::Data {
                mime: mime.to_string(),
                base64: payload.to_string(),
            });
        }
        if source.starts_with("https://") || source.starts_with("http://") {
            return Ok(Self::Url(source.to_string()));
        }
        Err(PromptCanvasError::NoImageProduced(format!(
            "unrecognized image reference: {}",
            source.chars().take(64).collect::<String>()
        )))
    }

    /// Returns the string a display surface loads: the URL or a `data:` URL.
    pub fn as_source(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Data { mime, base64 } => format!("data:{mime};base64,{base64}"),
        }
    }

    /// Returns true if the reference is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Url(url) => url.is_empty(),
            Self::Data { base64, .. } => base64.is_empty(),
        }
    }

    /// Returns true for embedded payloads.
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Data { mime, base64 } => {
                write!(f, "data:{mime};base64,<{} chars>", base64.len())
            }
        }
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Seed used, if the provider accepted one.
    pub seed: Option<u64>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image reference with its metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be handed to a display surface"]
pub struct GeneratedImage {
    /// Reference the display surface loads.
    pub image: ImageRef,
    /// Provider that produced this reference.
    pub provider: ImageProviderKind,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(image: ImageRef, provider: ImageProviderKind, metadata: GenerationMetadata) -> Self {
        Self {
            image,
            provider,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(
            ImageFormat::from_mime("image/jpeg; charset=binary"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime("IMAGE/PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime("application/json"), None);
    }

    #[test]
    fn test_validated_prompt() {
        assert_eq!(
            GenerationRequest::new("  a fox  ").validated_prompt().unwrap(),
            "a fox"
        );
        let err = GenerationRequest::new(" \n\t ").validated_prompt().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_request_wire_shape() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"prompt":"a fox","style":"anime"}"#).unwrap();
        assert_eq!(req, GenerationRequest::new("a fox").with_style("anime"));

        let no_style: GenerationRequest = serde_json::from_str(r#"{"prompt":"a fox"}"#).unwrap();
        assert_eq!(no_style.style, "");

        for body in [
            r#"{"prompt":"a fox","style":null}"#,
            r#"{"prompt":"a fox","style":7}"#,
            r#"{"prompt":"a fox","style":["anime"]}"#,
        ] {
            let req: GenerationRequest = serde_json::from_str(body).unwrap();
            assert_eq!(req.style, "", "{body}");
        }
    }

    #[test]
    fn test_image_ref_from_bytes_detects_format() {
        let image = ImageRef::from_bytes(&JPEG_MAGIC, ImageFormat::Png);
        assert!(image.as_source().starts_with("data:image/jpeg;base64,"));

        let unknown = ImageRef::from_bytes(b"not an image", ImageFormat::Png);
        assert!(unknown.as_source().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_ref_parse() {
        assert_eq!(
            ImageRef::parse("https://cdn.example.com/a.png").unwrap(),
            ImageRef::Url("https://cdn.example.com/a.png".into())
        );
        assert_eq!(
            ImageRef::parse("data:image/webp;base64,AQID").unwrap(),
            ImageRef::Data {
                mime: "image/webp".into(),
                base64: "AQID".into()
            }
        );
        assert!(ImageRef::parse("data:image/png,raw").is_err());
        assert!(ImageRef::parse("data:text/html;base64,PGgxPmhpPC9oMT4=").is_err());
        assert!(ImageRef::parse("data:application/octet-stream;base64,AQID").is_err());
        assert!(ImageRef::parse("ftp://example.com/a.png").is_err());
        assert!(ImageRef::parse("").is_err());
    }

    #[test]
    fn test_image_ref_display_hides_payload() {
        let image = ImageRef::Data {
            mime: "image/png".into(),
            base64: "A".repeat(4000),
        };
        assert_eq!(image.to_string(), "data:image/png;base64,<4000 chars>");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(
            ImageProviderKind::parse("Direct-URL"),
            Some(ImageProviderKind::DirectUrl)
        );
        assert_eq!(ImageProviderKind::parse("chat"), Some(ImageProviderKind::Chat));
        assert_eq!(ImageProviderKind::parse("flux"), None);
        assert_eq!(ImageProviderKind::Inference.to_string(), "inference");
    }
}
