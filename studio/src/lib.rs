//! Reference-image driven image generation against Gemini models, with
//! ordered model fallback.

pub mod client;
pub mod credentials;
pub mod decode;
pub mod error;
pub mod generator;
pub mod reference;
pub mod request;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use gemini_studio_types as types;

pub use client::{Client, ClientBuilder, ClientConfig, HttpOptions};
pub use credentials::{
    require_credential, Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use decode::GeneratedImage;
pub use error::{Error, Result};
pub use generator::{
    DispatchMode, FallbackGenerator, GenerationResult, DEFAULT_MODEL_FALLBACK_LIST,
};
pub use reference::{ReferenceBoard, ReferenceImage, SlotKind};
pub use request::{build_parts, GenerationRequest, ImageCount};
pub use transport::{DirectTransport, RawResponse, RelayTransport, Transport};
