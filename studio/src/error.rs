//! Error definitions for the generation core.

use thiserror::Error;

const QUOTA_MESSAGE: &str = "Error 429: this API key has hit its rate limit (quota exhausted). \
Try reducing the number of images to 1, wait a few minutes and try again, or switch to a different API key.";
const TRANSPORT_MESSAGE: &str = "Could not reach the image generation service. \
Check your network connection; ad blockers, VPNs or proxies can block direct API calls.";
const MISSING_CREDENTIAL_MESSAGE: &str = "Please enter an API key in the settings before generating.";
const EMPTY_REQUEST_MESSAGE: &str = "Upload at least one reference image or enter a prompt.";
const GENERIC_FAILURE_MESSAGE: &str = "Could not generate images. Please try again later.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing credential: {message}")]
    MissingCredential { message: String },

    #[error("Empty request: a prompt and/or at least one reference image is required")]
    EmptyRequest,

    #[error("No image in response from {model}: {detail}")]
    NoImageInResponse { model: String, detail: String },

    #[error("Quota exceeded for {model} (status {status}): {message}")]
    QuotaExceeded {
        model: String,
        status: u16,
        message: String,
    },

    #[error("API error from {model} (status {status}): {message}")]
    ApiError {
        model: String,
        status: u16,
        message: String,
    },

    #[error("Transport failure: {message}")]
    TransportFailure { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("All models failed ({}); last error: {}", .attempted.join(", "), describe_last(.last))]
    AllModelsFailed {
        attempted: Vec<String>,
        last: Option<Box<Error>>,
    },

    #[error("HTTP client error: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn describe_last(last: &Option<Box<Error>>) -> String {
    last.as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}

impl Error {
    /// 是否为配额/限流错误（穿透 `AllModelsFailed`）。
    #[must_use]
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExceeded { .. } => true,
            Self::AllModelsFailed {
                last: Some(last), ..
            } => last.is_quota(),
            _ => false,
        }
    }

    /// 是否为网络层失败。
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::TransportFailure { .. } | Self::Timeout { .. } => true,
            Self::AllModelsFailed {
                last: Some(last), ..
            } => last.is_transport(),
            _ => false,
        }
    }

    /// 面向最终用户的单条提示信息。
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::QuotaExceeded { .. } => QUOTA_MESSAGE.to_string(),
            Self::TransportFailure { .. } | Self::Timeout { .. } => TRANSPORT_MESSAGE.to_string(),
            Self::MissingCredential { .. } => MISSING_CREDENTIAL_MESSAGE.to_string(),
            Self::EmptyRequest => EMPTY_REQUEST_MESSAGE.to_string(),
            Self::AllModelsFailed { last, .. } => last
                .as_ref()
                .map_or_else(|| GENERIC_FAILURE_MESSAGE.to_string(), |last| last.user_message()),
            Self::NoImageInResponse { detail, .. } => {
                format!("The model did not return an image ({detail}). Try rewording the prompt.")
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
