//! Shared wire types for Gemini Studio.

mod base64_serde;

pub mod config;
pub mod content;
pub mod enums;
pub mod request;
pub mod response;
