use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures_util::future::BoxFuture;
use gemini_studio_types::request::GenerateContentRequest;
use serde_json::json;

use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::transport::{RawResponse, Transport};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let backup: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(key, _)| ((*key).to_string(), std::env::var(key).ok()))
        .collect();
    for (key, value) in vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    f();
    for (key, value) in backup {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

/// One scripted reply of [`StubTransport`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Image { mime: String, data: Vec<u8> },
    TextOnly(String),
    Status(u16, String),
    NetworkDown,
}

impl StubReply {
    pub fn png(data: &[u8]) -> Self {
        Self::Image {
            mime: "image/png".into(),
            data: data.to_vec(),
        }
    }

    pub fn quota() -> Self {
        Self::Status(
            429,
            json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}})
                .to_string(),
        )
    }

    fn into_result(self) -> Result<RawResponse> {
        match self {
            Self::Image { mime, data } => Ok(RawResponse::new(
                200,
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [
                            {"inlineData": {"mimeType": mime, "data": STANDARD.encode(data)}}
                        ]},
                        "finishReason": "STOP"
                    }]
                })
                .to_string(),
            )),
            Self::TextOnly(text) => Ok(RawResponse::new(
                200,
                json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": text}]},
                        "finishReason": "STOP"
                    }]
                })
                .to_string(),
            )),
            Self::Status(status, body) => Ok(RawResponse::new(status, body)),
            Self::NetworkDown => Err(Error::TransportFailure {
                message: "connection refused".into(),
            }),
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct StubCall {
    pub model: String,
    pub parts: usize,
    pub prompt: Option<String>,
}

/// Scripted transport: per-model reply queues, then a per-model repeating
/// reply, then 404.
#[derive(Debug, Default)]
pub struct StubTransport {
    scripts: Mutex<HashMap<String, VecDeque<StubReply>>>,
    repeating: HashMap<String, StubReply>,
    calls: Mutex<Vec<StubCall>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, replies: Vec<StubReply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), replies.into());
        self
    }

    pub fn always(mut self, model: &str, reply: StubReply) -> Self {
        self.repeating.insert(model.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.model == model)
            .count()
    }

    fn next_reply(&self, model: &str) -> StubReply {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front);
        scripted
            .or_else(|| self.repeating.get(model).cloned())
            .unwrap_or_else(|| StubReply::Status(404, format!("model {model} not found")))
    }
}

impl Transport for StubTransport {
    fn generate_content<'a>(
        &'a self,
        model: &'a str,
        request: &'a GenerateContentRequest,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, Result<RawResponse>> {
        Box::pin(async move {
            let first = request.contents.first();
            self.calls.lock().unwrap().push(StubCall {
                model: model.to_string(),
                parts: first.map_or(0, |content| content.parts.len()),
                prompt: first
                    .and_then(|content| content.first_text())
                    .map(ToString::to_string),
            });
            self.next_reply(model).into_result()
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
