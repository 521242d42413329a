use serde::{Deserialize, Serialize};

use crate::enums::Modality;

/// 生成配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<Modality>>,
}

impl GenerationConfig {
    /// 仅请求图片输出的配置。
    #[must_use]
    pub fn image_only() -> Self {
        Self {
            response_modalities: Some(vec![Modality::Image]),
            ..Self::default()
        }
    }
}

/// 图片输出配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// 宽高比，例如 `1:1`、`16:9`。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}
