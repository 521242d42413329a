mod support;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{build_relay_client, credential, image_response, quota_response, text_request};

#[tokio::test]
async fn relay_client_posts_model_and_contents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(header("x-gemini-api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "m1",
            "contents": [{"parts": [{"text": "a cat"}]}]
        })))
        .respond_with(image_response("AQ=="))
        .expect(3)
        .mount(&server)
        .await;

    let client = build_relay_client(&format!("{}/api/generate", server.uri()), &["m1"]);
    let result = client
        .generate(&text_request("a cat", 3), &credential())
        .await
        .unwrap();
    assert_eq!(result.images.len(), 3);
}

#[tokio::test]
async fn relay_quota_passthrough_moves_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "m1"})))
        .respond_with(quota_response())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"model": "m2"})))
        .respond_with(image_response("Ag=="))
        .mount(&server)
        .await;

    let client = build_relay_client(&format!("{}/api/generate", server.uri()), &["m1", "m2"]);
    let result = client
        .generate(&text_request("a cat", 2), &credential())
        .await
        .unwrap();
    assert_eq!(result.model, "m2");
    assert_eq!(result.images.len(), 2);
}

#[tokio::test]
async fn relay_missing_key_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Missing API Key"})))
        .mount(&server)
        .await;

    let client = build_relay_client(&format!("{}/api/generate", server.uri()), &["m1"]);
    let err = client
        .generate(&text_request("a cat", 1), &credential())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Missing API Key"));
    assert!(!err.is_quota());
}
