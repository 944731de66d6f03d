//! Deployment configuration read from the process environment.

use crate::error::{PromptCanvasError, Result};
use crate::image::providers::{
    ChatImageProvider, DirectUrlProvider, InferenceProvider, CHAT_API_KEY_ENV,
    INFERENCE_TOKEN_ENV,
};
use crate::image::{ImageProvider, ImageProviderKind};
use std::net::SocketAddr;
use std::sync::Arc;

/// Selects the provider strategy.
pub const PROVIDER_ENV: &str = "PROMPTCANVAS_PROVIDER";
/// Server listen address.
pub const BIND_ENV: &str = "PROMPTCANVAS_BIND";
/// Provider model override.
pub const MODEL_ENV: &str = "PROMPTCANVAS_MODEL";
/// Provider base URL override.
pub const BASE_URL_ENV: &str = "PROMPTCANVAS_BASE_URL";
/// Direct-URL image width.
pub const WIDTH_ENV: &str = "PROMPTCANVAS_WIDTH";
/// Direct-URL image height.
pub const HEIGHT_ENV: &str = "PROMPTCANVAS_HEIGHT";

const DEFAULT_BIND: &str = "0.0.0.0:8787";
const DEFAULT_SIZE: u32 = 1024;

/// Provider selection and credentials, fixed for the life of the process.
#[derive(Clone)]
pub struct Config {
    /// Which provider strategy serves requests.
    pub provider: ImageProviderKind,
    /// Server listen address.
    pub bind: SocketAddr,
    /// Model override for the selected provider.
    pub model: Option<String>,
    /// Base URL override for the selected provider.
    pub base_url: Option<String>,
    /// Direct-URL image width.
    pub width: u32,
    /// Direct-URL image height.
    pub height: u32,
    /// Credential for the inference provider.
    pub inference_token: Option<String>,
    /// Credential for the chat provider.
    pub chat_api_key: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("bind", &self.bind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("inference_token", &self.inference_token.as_ref().map(|_| "***"))
            .field("chat_api_key", &self.chat_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ImageProviderKind::Inference,
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8787))),
            model: None,
            base_url: None,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            inference_token: None,
            chat_api_key: None,
        }
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = get(PROVIDER_ENV) {
            config.provider = ImageProviderKind::parse(&name).ok_or_else(|| {
                PromptCanvasError::NotConfigured(format!(
                    "unknown provider {name:?} in {PROVIDER_ENV} (expected direct-url, inference or chat)"
                ))
            })?;
        }
        if let Some(bind) = get(BIND_ENV) {
            config.bind = bind.trim().parse().map_err(|e| {
                PromptCanvasError::NotConfigured(format!("invalid {BIND_ENV} {bind:?}: {e}"))
            })?;
        }
        if let Some(width) = get(WIDTH_ENV) {
            config.width = parse_dimension(WIDTH_ENV, &width)?;
        }
        if let Some(height) = get(HEIGHT_ENV) {
            config.height = parse_dimension(HEIGHT_ENV, &height)?;
        }

        config.model = get(MODEL_ENV);
        config.base_url = get(BASE_URL_ENV);
        config.inference_token = get(INFERENCE_TOKEN_ENV);
        config.chat_api_key = get(CHAT_API_KEY_ENV);

        Ok(config)
    }

    /// Returns the credential variable the selected provider needs, if any.
    pub fn credential_env(&self) -> Option<&'static str> {
        match self.provider {
            ImageProviderKind::DirectUrl => None,
            ImageProviderKind::Inference => Some(INFERENCE_TOKEN_ENV),
            ImageProviderKind::Chat => Some(CHAT_API_KEY_ENV),
        }
    }

    /// Builds a Direct-URL provider with this configuration's overrides.
    ///
    /// Used directly by standalone composition, whatever provider is selected.
    pub fn direct_url_provider(&self) -> Result<DirectUrlProvider> {
        let mut builder = DirectUrlProvider::builder().size(self.width, self.height);
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Builds the selected provider.
    ///
    /// Missing credentials yield `NotConfigured` without touching the network.
    pub fn build_provider(&self) -> Result<Arc<dyn ImageProvider>> {
        let missing = |env: &str| {
            PromptCanvasError::NotConfigured(format!("{env} is not configured"))
        };

        let provider: Arc<dyn ImageProvider> = match self.provider {
            ImageProviderKind::DirectUrl => Arc::new(self.direct_url_provider()?),
            ImageProviderKind::Inference => {
                let token = self
                    .inference_token
                    .as_ref()
                    .ok_or_else(|| missing(INFERENCE_TOKEN_ENV))?;
                let mut builder = InferenceProvider::builder().api_key(token);
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(base_url) = &self.base_url {
                    builder = builder.base_url(base_url);
                }
                Arc::new(builder.build()?)
            }
            ImageProviderKind::Chat => {
                let key = self
                    .chat_api_key
                    .as_ref()
                    .ok_or_else(|| missing(CHAT_API_KEY_ENV))?;
                let mut builder = ChatImageProvider::builder().api_key(key);
                if let Some(model) = &self.model {
                    builder = builder.model(model);
                }
                if let Some(base_url) = &self.base_url {
                    builder = builder.base_url(base_url);
                }
                Arc::new(builder.build()?)
            }
        };
        Ok(provider)
    }
}

fn parse_dimension(key: &str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(PromptCanvasError::NotConfigured(format!(
            "invalid {key} {value:?}: expected a positive integer"
        ))),
    }
}
