//! Client configuration and transport selection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gemini_studio_types::config::{GenerationConfig, ImageConfig};
use gemini_studio_types::enums::Modality;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as HttpClient, Proxy};

use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::generator::{DispatchMode, FallbackGenerator, GenerationResult, DEFAULT_MODEL_FALLBACK_LIST};
use crate::request::GenerationRequest;
use crate::transport::{DirectTransport, RelayTransport, Transport};

/// 图片生成客户端。
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
pub(crate) struct ClientInner {
    pub config: ClientConfig,
    pub generator: FallbackGenerator,
}

/// 客户端配置。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP 配置。
    pub http_options: HttpOptions,
    /// 中继地址；设置后经中继转发而不是直连。
    pub relay_url: Option<String>,
    /// 模型回退顺序。
    pub models: Vec<String>,
    /// 同一模型内的调用派发方式。
    pub dispatch: DispatchMode,
    /// 随请求发送的 generationConfig。
    pub generation_config: Option<GenerationConfig>,
}

/// HTTP 配置。
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub headers: HashMap<String, String>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
}

impl Client {
    /// 使用默认配置创建客户端（直连 Gemini API）。
    ///
    /// # Errors
    /// 当构建 HTTP 客户端失败时返回错误。
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// 从环境变量创建客户端。
    ///
    /// # Errors
    /// 当环境变量中的配置无效时返回错误。
    pub fn from_env() -> Result<Self> {
        ClientBuilder::from_env().build()
    }

    /// 创建 Builder。
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// 使用自定义 transport（默认模型列表与派发方式）。
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let config = ClientConfig {
            http_options: HttpOptions::default(),
            relay_url: None,
            models: default_models(),
            dispatch: DispatchMode::default(),
            generation_config: Some(GenerationConfig::image_only()),
        };
        Self::from_parts(config, transport)
    }

    fn from_parts(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let generator = FallbackGenerator::new(transport)
            .with_dispatch(config.dispatch)
            .with_generation_config(config.generation_config.clone());
        Self {
            inner: Arc::new(ClientInner { config, generator }),
        }
    }

    /// 当前配置。
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// 底层生成器。
    #[must_use]
    pub fn generator(&self) -> &FallbackGenerator {
        &self.inner.generator
    }

    /// 按配置的模型列表生成。
    ///
    /// # Errors
    /// 全部模型失败时返回 `AllModelsFailed`。
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<GenerationResult> {
        self.inner
            .generator
            .generate(request, &self.inner.config.models, credential)
            .await
    }

    /// 使用指定模型列表生成。
    ///
    /// # Errors
    /// 模型列表为空时返回 `InvalidConfig`；全部模型失败时返回 `AllModelsFailed`。
    pub async fn generate_with_models<S: AsRef<str>>(
        &self,
        request: &GenerationRequest,
        models: &[S],
        credential: &Credential,
    ) -> Result<GenerationResult> {
        self.inner.generator.generate(request, models, credential).await
    }
}

/// 客户端 Builder。
#[derive(Default, Debug)]
pub struct ClientBuilder {
    http_options: HttpOptions,
    relay_url: Option<String>,
    models: Option<Vec<String>>,
    dispatch: Option<DispatchMode>,
    response_modalities: Option<Vec<Modality>>,
    aspect_ratio: Option<String>,
}

impl ClientBuilder {
    /// 读取环境变量覆盖项，空白值被忽略。
    #[must_use]
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Some(base_url) = env_value("GEMINI_BASE_URL").or_else(|| env_value("GENAI_BASE_URL")) {
            builder = builder.base_url(base_url);
        }
        if let Some(api_version) = env_value("GENAI_API_VERSION") {
            builder = builder.api_version(api_version);
        }
        if let Some(relay_url) = env_value("GEMINI_STUDIO_RELAY_URL") {
            builder = builder.relay_url(relay_url);
        }
        if let Some(models) = env_value("GEMINI_STUDIO_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|model| !model.is_empty())
                .map(ToString::to_string)
                .collect();
            if !models.is_empty() {
                builder = builder.models(models);
            }
        }
        builder
    }

    /// 设置请求超时（秒）。
    #[must_use]
    pub const fn timeout(mut self, secs: u64) -> Self {
        self.http_options.timeout = Some(secs);
        self
    }

    /// 设置代理。
    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.http_options.proxy = Some(url.into());
        self
    }

    /// 增加默认 HTTP 头。
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_options.headers.insert(key.into(), value.into());
        self
    }

    /// 设置自定义基础 URL。
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http_options.base_url = Some(base_url.into());
        self
    }

    /// 设置 API 版本。
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.http_options.api_version = Some(api_version.into());
        self
    }

    /// 经中继转发。
    #[must_use]
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }

    /// 设置模型回退顺序。
    #[must_use]
    pub fn models(mut self, models: Vec<String>) -> Self {
        self.models = Some(models);
        self
    }

    #[must_use]
    pub const fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// 覆盖 responseModalities（默认仅 IMAGE）。
    #[must_use]
    pub fn response_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.response_modalities = Some(modalities);
        self
    }

    /// 设置输出宽高比。
    #[must_use]
    pub fn aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    /// 构建客户端。
    ///
    /// # Errors
    /// 当参数无效或构建 HTTP 客户端失败时返回错误。
    pub fn build(self) -> Result<Client> {
        let Self {
            http_options,
            relay_url,
            models,
            dispatch,
            response_modalities,
            aspect_ratio,
        } = self;

        let models = models.unwrap_or_else(default_models);
        if models.is_empty() || models.iter().any(|model| model.trim().is_empty()) {
            return Err(Error::InvalidConfig {
                message: "model list must contain at least one non-blank model".into(),
            });
        }
        let relay_url = relay_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let headers = Self::build_headers(&http_options)?;
        let http = Self::build_http_client(&http_options, headers)?;
        let transport: Arc<dyn Transport> = match &relay_url {
            Some(url) => Arc::new(RelayTransport::new(http, url.clone())),
            None => Arc::new(DirectTransport::new(
                http,
                http_options.base_url.as_deref(),
                http_options.api_version.as_deref(),
            )),
        };

        let generation_config = GenerationConfig {
            response_modalities: Some(response_modalities.unwrap_or_else(|| vec![Modality::Image])),
            image_config: aspect_ratio.map(|ratio| ImageConfig {
                aspect_ratio: Some(ratio),
            }),
            ..GenerationConfig::default()
        };
        let config = ClientConfig {
            http_options,
            relay_url,
            models,
            dispatch: dispatch.unwrap_or_default(),
            generation_config: Some(generation_config),
        };
        Ok(Client::from_parts(config, transport))
    }

    fn build_headers(http_options: &HttpOptions) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &http_options.headers {
            let name =
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| Error::InvalidConfig {
                    message: format!("Invalid header name: {key}"),
                })?;
            let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidConfig {
                message: format!("Invalid header value for {key}"),
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn build_http_client(http_options: &HttpOptions, headers: HeaderMap) -> Result<HttpClient> {
        let mut http_builder = HttpClient::builder();
        if let Some(timeout) = http_options.timeout {
            http_builder = http_builder.timeout(Duration::from_secs(timeout));
        }

        if let Some(proxy_url) = &http_options.proxy {
            let proxy = Proxy::all(proxy_url).map_err(|e| Error::InvalidConfig {
                message: format!("Invalid proxy: {e}"),
            })?;
            http_builder = http_builder.proxy(proxy);
        }

        if !headers.is_empty() {
            http_builder = http_builder.default_headers(headers);
        }

        Ok(http_builder.build()?)
    }
}

fn default_models() -> Vec<String> {
    DEFAULT_MODEL_FALLBACK_LIST
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
