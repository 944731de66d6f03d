//! Image generation providers.

mod chat;
mod direct_url;
mod inference;

pub(crate) use direct_url::nonce;

pub use chat::{ChatImageProvider, ChatImageProviderBuilder, API_KEY_ENV as CHAT_API_KEY_ENV};
pub use direct_url::{DirectUrlProvider, DirectUrlProviderBuilder};
pub use inference::{
    InferenceProvider, InferenceProviderBuilder, TOKEN_ENV as INFERENCE_TOKEN_ENV,
};
