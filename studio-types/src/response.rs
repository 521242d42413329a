use serde::{Deserialize, Serialize};

use crate::content::Content;

/// 生成内容响应。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl GenerateContentResponse {
    /// 第一个候选的内容。
    #[must_use]
    pub fn first_content(&self) -> Option<&Content> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
    }

    /// 提取第一个候选的文本。
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.first_content()
            .and_then(Content::first_text)
            .map(ToString::to_string)
    }
}

/// 响应候选。
///
/// `finish_reason` 保留原始字符串，新模型会引入枚举之外的取值（如 `IMAGE_SAFETY`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
}

/// Prompt 反馈。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason_message: Option<String>,
}

/// 错误响应体：`{"error": {...}}`（上游）或 `{"error": "..."}`（中继）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorBody {
    Status(ApiStatus),
    Message(String),
}

/// Google API 标准错误状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ApiErrorResponse {
    /// 错误消息（若有）。
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.error {
            ApiErrorBody::Status(status) => status.message.as_deref(),
            ApiErrorBody::Message(message) => Some(message.as_str()),
        }
    }

    /// 规范状态名，例如 `RESOURCE_EXHAUSTED`。
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        match &self.error {
            ApiErrorBody::Status(status) => status.status.as_deref(),
            ApiErrorBody::Message(_) => None,
        }
    }
}
