use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use gemini_studio::transport::{API_KEY_HEADER, RELAY_KEY_HEADER, model_method_url, normalize_base_url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Shared state of the relay
pub struct RelayState {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl RelayState {
    /// Build the upstream HTTP client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build upstream client: {e}"))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(&config.upstream_base_url),
            api_version: config.api_version.trim().to_string(),
        })
    }

    fn upstream_url(&self, model: &str) -> String {
        model_method_url(&self.base_url, &self.api_version, model, "generateContent")
    }
}

/// Body accepted from the front end
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayBody {
    model: Option<String>,
    contents: Option<Value>,
    generation_config: Option<Value>,
}

/// Body sent upstream: everything but the model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<Value>,
    generation_config: Value,
}

/// Handle `POST /api/generate`
pub(crate) async fn generate(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let api_key = headers
        .get(RELAY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(RelayError::MissingApiKey)?
        .to_string();

    let request: RelayBody = if body.is_empty() {
        RelayBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| RelayError::InvalidBody(e.to_string()))?
    };
    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .ok_or(RelayError::MissingModel)?
        .to_string();

    let upstream = UpstreamBody {
        contents: request.contents,
        generation_config: request
            .generation_config
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    };

    tracing::debug!(model = %model, "forwarding generateContent");

    let response = state
        .http
        .post(state.upstream_url(&model))
        .header(API_KEY_HEADER, api_key)
        .json(&upstream)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(model = %model, error = %e, "upstream request failed");
            RelayError::Upstream(e.to_string())
        })?;

    let status = response.status().as_u16();
    let payload = response.text().await.map_err(|e| {
        tracing::error!(model = %model, error = %e, "failed to read upstream body");
        RelayError::Upstream(e.to_string())
    })?;

    if (200..300).contains(&status) {
        tracing::info!(model = %model, status, "upstream call succeeded");
    } else {
        tracing::warn!(model = %model, status, "upstream returned an error");
    }

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, [(header::CONTENT_TYPE, "application/json")], payload).into_response())
}

/// Handle `OPTIONS /api/generate`
pub(crate) async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on `/api/generate`
pub(crate) async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}
