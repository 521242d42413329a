#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::ResponseTemplate;

use gemini_studio::{Client, Credential, DispatchMode, GenerationRequest, ImageCount};

pub fn build_direct_client(base_url: &str, models: &[&str]) -> Client {
    Client::builder()
        .base_url(base_url)
        .models(models.iter().map(ToString::to_string).collect())
        .dispatch(DispatchMode::Sequential {
            spacing: Duration::ZERO,
        })
        .build()
        .unwrap()
}

pub fn build_relay_client(relay_url: &str, models: &[&str]) -> Client {
    Client::builder()
        .relay_url(relay_url)
        .models(models.iter().map(ToString::to_string).collect())
        .dispatch(DispatchMode::Concurrent)
        .build()
        .unwrap()
}

pub fn credential() -> Credential {
    Credential::new("test-key").unwrap()
}

pub fn text_request(prompt: &str, count: usize) -> GenerationRequest {
    GenerationRequest::new(prompt, std::iter::empty(), ImageCount::new(count).unwrap()).unwrap()
}

pub fn image_body(mime: &str, base64_data: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": mime, "data": base64_data}}
            ]},
            "finishReason": "STOP"
        }],
        "modelVersion": "test"
    })
}

pub fn image_response(base64_data: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(image_body("image/png", base64_data))
}

pub fn text_only_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "I can only describe it"}]},
            "finishReason": "STOP"
        }]
    }))
}

pub fn quota_response() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted (e.g. check quota).",
            "status": "RESOURCE_EXHAUSTED"
        }
    }))
}
