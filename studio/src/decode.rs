//! Classify a raw provider response into one generated image or a typed failure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gemini_studio_types::response::{ApiErrorResponse, GenerateContentResponse};
use http::StatusCode;

use crate::error::{Error, Result};
use crate::transport::RawResponse;

const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// 生成的单张图片。
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl GeneratedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// `data:<mime>;base64,<data>`。
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    /// 按 MIME 推断文件扩展名，未知类型回落到 `png`。
    #[must_use]
    pub fn extension(&self) -> &'static str {
        mime_guess::get_mime_extensions_str(&self.mime_type)
            .and_then(|extensions| {
                let preferred = ["png", "jpg", "jpeg", "webp", "gif"];
                preferred
                    .into_iter()
                    .find(|candidate| extensions.contains(candidate))
                    .or_else(|| extensions.first().copied())
            })
            .unwrap_or("png")
    }
}

impl std::fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// 解析单次调用的原始响应。
///
/// # Errors
/// 429 / `RESOURCE_EXHAUSTED` 返回 `QuotaExceeded`，其它非 2xx 返回 `ApiError`，
/// 成功但没有图片时返回 `NoImageInResponse`。
pub fn classify_response(model: &str, raw: RawResponse) -> Result<GeneratedImage> {
    if !raw.is_success() {
        return Err(classify_failure(model, raw));
    }

    let response: GenerateContentResponse = match serde_json::from_str(&raw.body) {
        Ok(response) => response,
        Err(err) => {
            return Err(Error::NoImageInResponse {
                model: model.to_string(),
                detail: format!("undecodable response body: {err}"),
            })
        }
    };
    extract_image(model, &response)
}

/// 第一个候选中第一个 inlineData part 胜出，后续候选与 part 被忽略。
///
/// # Errors
/// 没有图片时返回 `NoImageInResponse`。
pub fn extract_image(model: &str, response: &GenerateContentResponse) -> Result<GeneratedImage> {
    if let Some(blob) = response
        .first_content()
        .and_then(|content| content.first_inline_data())
    {
        return Ok(GeneratedImage::new(blob.mime_type.clone(), blob.data.clone()));
    }
    Err(Error::NoImageInResponse {
        model: model.to_string(),
        detail: missing_image_detail(response),
    })
}

fn missing_image_detail(response: &GenerateContentResponse) -> String {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return format!("prompt blocked: {reason}");
    }
    let Some(candidate) = response.candidates.first() else {
        return "no candidates".into();
    };
    if let Some(text) = response.text().filter(|text| !text.trim().is_empty()) {
        return format!("model replied with text: {}", truncate(&text, 120));
    }
    candidate.finish_reason.as_deref().map_or_else(
        || "no inline image part".into(),
        |reason| format!("finish reason {reason}"),
    )
}

fn classify_failure(model: &str, raw: RawResponse) -> Error {
    let parsed: Option<ApiErrorResponse> = serde_json::from_str(&raw.body).ok();
    let message = parsed
        .as_ref()
        .and_then(ApiErrorResponse::message)
        .map_or_else(|| fallback_message(&raw), ToString::to_string);
    let exhausted = parsed
        .as_ref()
        .and_then(ApiErrorResponse::status)
        .is_some_and(|status| status == RESOURCE_EXHAUSTED)
        || raw.body.contains(RESOURCE_EXHAUSTED);

    if raw.status == StatusCode::TOO_MANY_REQUESTS.as_u16() || exhausted {
        Error::QuotaExceeded {
            model: model.to_string(),
            status: raw.status,
            message,
        }
    } else {
        Error::ApiError {
            model: model.to_string(),
            status: raw.status,
            message,
        }
    }
}

fn fallback_message(raw: &RawResponse) -> String {
    let body = raw.body.trim();
    if body.is_empty() {
        StatusCode::from_u16(raw.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("unknown error")
            .to_string()
    } else {
        truncate(body, 500)
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max_chars).collect();
    out.push('…');
    out
}
