#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Relay service: accepts `{model, contents}` with the key in
//! `x-gemini-api-key` and forwards it to the Gemini API server-side.

pub mod config;
mod error;
mod handler;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
    middleware::map_response,
    response::Response,
    routing::post,
};

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use handler::RelayState;

/// Path served by the relay
pub const GENERATE_PATH: &str = "/api/generate";

/// Build the relay router
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route(
            GENERATE_PATH,
            post(handler::generate)
                .options(handler::preflight)
                .fallback(handler::method_not_allowed),
        )
        .layer(map_response(add_cors_headers))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    config: RelayConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(RelayState::new(&config)?);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.listen))?;

    tracing::info!(listen = %config.listen, upstream = %config.upstream_base_url, "relay listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("relay server error: {e}"))
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, x-gemini-api-key"),
    );
    response
}
