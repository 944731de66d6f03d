//! Display surfaces: where an [`ImageRef`] is actually loaded.
//!
//! A surface reports exactly one of load or error per reference. The
//! [`WaitController`](crate::wait::WaitController) turns that into
//! `Ready` or `Failed`.

use crate::error::{PromptCanvasError, Result};
use crate::image::{ImageFormat, ImageRef};
use async_trait::async_trait;
use base64::Engine;
use std::path::{Path, PathBuf};

/// Loads an image reference and reports the outcome.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Loads `image`. `Ok` is the load event, `Err` the error event.
    async fn load(&self, image: &ImageRef) -> Result<()>;
}

/// Loads images by writing them to a file.
///
/// URLs are fetched, `data:` payloads are decoded. Anything that keeps the
/// bytes from reaching disk is a [`PromptCanvasError::Render`].
pub struct FileSurface {
    client: reqwest::Client,
    path: PathBuf,
}

impl FileSurface {
    /// Creates a surface writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            path: path.into(),
        }
    }

    /// Replaces the HTTP client used for URL references.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| render_error(format!("fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(render_error(format!("image host answered {status}")));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.starts_with("image/") {
                return Err(render_error(format!(
                    "unexpected content type {content_type}"
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| render_error(format!("read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DisplaySurface for FileSurface {
    async fn load(&self, image: &ImageRef) -> Result<()> {
        let bytes = match image {
            ImageRef::Url(url) => self.fetch(url).await?,
            ImageRef::Data { base64, .. } => base64::engine::general_purpose::STANDARD
                .decode(base64)
                .map_err(|e| render_error(format!("invalid base64 payload: {e}")))?,
        };

        if bytes.is_empty() {
            return Err(render_error("image is empty"));
        }

        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|e| render_error(format!("write {}: {e}", self.path.display())))?;

        let format = ImageFormat::from_magic_bytes(&bytes);
        tracing::debug!(
            path = %self.path.display(),
            size = bytes.len(),
            format = format.map(|f| f.extension()).unwrap_or("unknown"),
            "image written"
        );
        Ok(())
    }
}

fn render_error(reason: impl Into<String>) -> PromptCanvasError {
    PromptCanvasError::Render(reason.into())
}
