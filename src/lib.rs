#![warn(missing_docs)]
//! PromptCanvas - style-aware text-to-image generation.
//!
//! A short description plus a named style becomes an enhanced prompt, which
//! one configured provider turns into an image reference (a URL or an inline
//! `data:` payload). A wait-state controller tracks the submission until the
//! image is displayed.
//!
//! # Quick Start
//!
//! ```no_run
//! use promptcanvas::{GenerationRequest, Orchestrator, StyleTable};
//! use promptcanvas::providers::DirectUrlProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> promptcanvas::Result<()> {
//!     let provider = DirectUrlProvider::builder().build()?;
//!     let orchestrator = Orchestrator::new(Arc::new(StyleTable::builtin()), Arc::new(provider));
//!     let request = GenerationRequest::new("a red fox in snow").with_style("anime");
//!     let generated = orchestrator.generate(&request).await?;
//!     println!("{}", generated.image);
//!     Ok(())
//! }
//! ```
//!
//! # Providers
//!
//! - `direct-url`: builds a deterministic image URL, no network call
//! - `inference`: hosted inference API returning raw image bytes
//! - `chat`: chat-completions API with image output modality
//!
//! # Features
//!
//! - `server`: axum HTTP boundary ([`server`])
//! - `cli`: the `promptcanvas` binary

mod error;

pub mod composer;
pub mod config;
pub mod display;
pub mod image;
pub mod orchestrator;
#[cfg(feature = "server")]
pub mod server;
pub mod style;
pub mod wait;

pub use error::{ErrorKind, PromptCanvasError, Result};

pub use composer::{
    Composer, ComposerClient, ComposerMode, GenerationBoundary, RemoteBoundary,
    StandaloneBoundary,
};
pub use config::Config;
pub use display::{DisplaySurface, FileSurface};
pub use image::providers;
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProvider,
    ImageProviderKind, ImageRef, ProviderRequest,
};
pub use orchestrator::Orchestrator;
pub use style::{StyleKey, StyleTable};
pub use wait::{Notice, Ticket, WaitController, WaitEvent, WaitSnapshot, WaitState};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::composer::{ComposerClient, GenerationBoundary};
    pub use crate::display::DisplaySurface;
    pub use crate::error::{ErrorKind, PromptCanvasError, Result};
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, ImageRef};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::style::StyleTable;
    pub use crate::wait::{WaitController, WaitState};
}
