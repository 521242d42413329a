use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::content::Content;

/// `models/{model}:generateContent` 请求体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// 中继服务请求体：模型放在 body 中，凭据走请求头。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub model: String,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl RelayRequest {
    /// 由 generateContent 请求体包装。
    #[must_use]
    pub fn wrap(model: impl Into<String>, request: &GenerateContentRequest) -> Self {
        Self {
            model: model.into(),
            contents: request.contents.clone(),
            generation_config: request.generation_config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Part;
    use serde_json::json;

    #[test]
    fn relay_request_carries_model_and_contents() {
        let request = GenerateContentRequest {
            contents: vec![Content::from_parts(vec![Part::text("a cat")])],
            generation_config: Some(GenerationConfig::image_only()),
        };
        let value = serde_json::to_value(RelayRequest::wrap("m1", &request)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "m1",
                "contents": [{"parts": [{"text": "a cat"}]}],
                "generationConfig": {"responseModalities": ["IMAGE"]}
            })
        );
    }
}
