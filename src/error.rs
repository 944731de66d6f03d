//! Error types for image generation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest provider error body surfaced to callers.
const MAX_DETAIL_LEN: usize = 500;

/// Classification of a failed generation, independent of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty prompt or malformed request body. Caller's fault, no retry.
    InvalidInput,
    /// Provider credentials or selection missing at startup.
    NotConfigured,
    /// Provider-imposed rate limit.
    RateLimited,
    /// Provider credits or quota exhausted.
    QuotaExhausted,
    /// Opaque upstream failure.
    ProviderError,
    /// Upstream answered 2xx without a usable image.
    NoImageProduced,
    /// The display surface could not load the returned reference.
    RenderFailure,
}

impl ErrorKind {
    /// Returns the HTTP status used on the generation boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::QuotaExhausted => 402,
            Self::RateLimited => 429,
            Self::NotConfigured
            | Self::ProviderError
            | Self::NoImageProduced
            | Self::RenderFailure => 500,
        }
    }

    /// Returns the message shown to the person waiting on the image.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please enter a description for your image",
            Self::NotConfigured => "The image service is not configured.",
            Self::RateLimited => "Rate limit exceeded. Please try again in a moment.",
            Self::QuotaExhausted => "AI credits exhausted. Please add more credits in Settings.",
            Self::ProviderError => "Failed to generate image. Please try again.",
            Self::NoImageProduced => "No image was generated. Please try again.",
            Self::RenderFailure => "The generated image could not be displayed.",
        }
    }

    /// Maps a boundary status code back to a kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidInput,
            402 => Self::QuotaExhausted,
            429 => Self::RateLimited,
            _ => Self::ProviderError,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid_input",
            Self::NotConfigured => "not_configured",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ProviderError => "provider_error",
            Self::NoImageProduced => "no_image_produced",
            Self::RenderFailure => "render_failure",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while generating or displaying an image.
#[derive(Debug, thiserror::Error)]
pub enum PromptCanvasError {
    /// Invalid request parameters (empty prompt, malformed body).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Provider credentials or selection missing.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Option<Duration>,
        detail: Option<String>,
    },

    /// Credits or quota exhausted.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Successful response that carried no image.
    #[error("no image produced: {0}")]
    NoImageProduced(String),

    /// The image reference could not be loaded.
    #[error("render failed: {0}")]
    Render(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Socket or file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PromptCanvasError {
    /// Returns the provider-independent classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::QuotaExhausted(_) => ErrorKind::QuotaExhausted,
            Self::Api { .. } | Self::Network(_) | Self::Json(_) | Self::Io(_) => {
                ErrorKind::ProviderError
            }
            Self::NoImageProduced(_) => ErrorKind::NoImageProduced,
            Self::Render(_) => ErrorKind::RenderFailure,
        }
    }

    /// Raw upstream detail for diagnostics, if any.
    pub fn provider_detail(&self) -> Option<String> {
        match self {
            Self::RateLimited { detail, .. } => detail.clone(),
            Self::QuotaExhausted(detail) => Some(detail.clone()),
            Self::Api { status, message } => Some(format!("{status}: {message}")),
            Self::Network(e) => Some(e.to_string()),
            Self::Json(e) => Some(e.to_string()),
            Self::Io(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Returns the HTTP status used on the generation boundary.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns the human-readable message for this failure.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// Returns true if a new submission may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::RateLimited | ErrorKind::ProviderError | ErrorKind::NoImageProduced
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, PromptCanvasError>;

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Redacts bearer tokens and truncates an upstream error body.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_DETAIL_LEN));
    let mut words = text.split(' ').peekable();
    while let Some(word) = words.next() {
        out.push_str(word);
        if word.eq_ignore_ascii_case("bearer") {
            if let Some(_token) = words.next() {
                out.push_str(" [redacted]");
            }
        }
        if words.peek().is_some() {
            out.push(' ');
        }
    }

    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_DETAIL_LEN {
        let cut: String = trimmed.chars().take(MAX_DETAIL_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Classifies a non-2xx provider response.
pub(crate) fn classify_status(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> PromptCanvasError {
    let text = sanitize_error_message(text);
    match status {
        429 => PromptCanvasError::RateLimited {
            retry_after: parse_retry_after(headers).map(Duration::from_secs),
            detail: Some(format!("{status}: {text}")),
        },
        402 => PromptCanvasError::QuotaExhausted(format!("{status}: {text}")),
        _ => PromptCanvasError::Api {
            status,
            message: text,
        },
    }
}
