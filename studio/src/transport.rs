//! Transports that carry one generateContent call to the provider.
//!
//! A transport only moves bytes: non-2xx statuses come back as a
//! [`RawResponse`] so that failure classification stays in one place.

use futures_util::future::BoxFuture;
use gemini_studio_types::request::{GenerateContentRequest, RelayRequest};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client as HttpClient;

use crate::credentials::Credential;
use crate::error::{Error, Result};

/// Gemini API 的凭据请求头。
pub const API_KEY_HEADER: &str = "x-goog-api-key";
/// 中继服务的凭据请求头。
pub const RELAY_KEY_HEADER: &str = "x-gemini-api-key";
/// 默认 Gemini API 地址。
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
/// 默认 API 版本。
pub const DEFAULT_API_VERSION: &str = "v1beta";

/// 上游原始响应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// 发送单次 generateContent 调用。
pub trait Transport: Send + Sync {
    fn generate_content<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<RawResponse>>;

    /// 日志中使用的名称。
    fn name(&self) -> &'static str;
}

/// 直接调用 Gemini API。
#[derive(Debug, Clone)]
pub struct DirectTransport {
    http: HttpClient,
    base_url: String,
    api_version: String,
}

impl DirectTransport {
    pub fn new(http: HttpClient, base_url: Option<&str>, api_version: Option<&str>) -> Self {
        Self {
            http,
            base_url: base_url.map_or_else(|| DEFAULT_BASE_URL.to_string(), normalize_base_url),
            api_version: api_version.unwrap_or(DEFAULT_API_VERSION).to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// 目标模型的 generateContent 地址。
    #[must_use]
    pub fn url_for(&self, model: &str) -> String {
        model_method_url(&self.base_url, &self.api_version, model, "generateContent")
    }
}

impl Transport for DirectTransport {
    fn generate_content<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            let header = credential_header(credential)?;
            let request = self
                .http
                .post(self.url_for(model))
                .header(HeaderName::from_static(API_KEY_HEADER), header)
                .json(request);
            send(request).await
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// 经中继服务转发：body 为 `{model, contents}`，凭据放在请求头。
#[derive(Debug, Clone)]
pub struct RelayTransport {
    http: HttpClient,
    url: String,
}

impl RelayTransport {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into().trim().to_string(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for RelayTransport {
    fn generate_content<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            let header = credential_header(credential)?;
            let body = RelayRequest::wrap(model, request);
            let request = self
                .http
                .post(&self.url)
                .header(HeaderName::from_static(RELAY_KEY_HEADER), header)
                .json(&body);
            send(request).await
        })
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

/// Gemini API 的模型名：补全 `models/` 前缀。
#[must_use]
pub fn transform_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// 拼接 `{base}{version}/models/{model}:{method}`。
#[must_use]
pub fn model_method_url(base_url: &str, api_version: &str, model: &str, method: &str) -> String {
    let model = transform_model_name(model.trim());
    format!("{base_url}{api_version}/{model}:{method}")
}

/// 规范化 base URL（保证以 `/` 结尾）。
#[must_use]
pub fn normalize_base_url(base_url: &str) -> String {
    let mut value = base_url.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

fn credential_header(credential: &Credential) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(credential.expose()).map_err(|_| Error::InvalidConfig {
        message: "Invalid API key value".into(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

async fn send(request: reqwest::RequestBuilder) -> Result<RawResponse> {
    let response = request.send().await.map_err(map_send_error)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(map_send_error)?;
    Ok(RawResponse { status, body })
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            message: err.to_string(),
        }
    } else {
        Error::TransportFailure {
            message: err.to_string(),
        }
    }
}
