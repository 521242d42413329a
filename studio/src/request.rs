//! Request building: prompt + enabled reference images → ordered parts.

use gemini_studio_types::config::GenerationConfig;
use gemini_studio_types::content::{Content, Part};
use gemini_studio_types::request::GenerateContentRequest;

use crate::error::{Error, Result};
use crate::reference::{ReferenceBoard, ReferenceImage};

/// 单次生成的最少/最多图片数。
pub const MIN_IMAGE_COUNT: usize = 1;
pub const MAX_IMAGE_COUNT: usize = 4;

/// 期望生成的图片数量，取值范围 `[1, 4]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageCount(usize);

impl ImageCount {
    /// 校验后创建。
    ///
    /// # Errors
    /// 当数量不在 `[1, 4]` 内时返回错误。
    pub fn new(count: usize) -> Result<Self> {
        if !(MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT).contains(&count) {
            return Err(Error::InvalidConfig {
                message: format!(
                    "image count must be between {MIN_IMAGE_COUNT} and {MAX_IMAGE_COUNT}, got {count}"
                ),
            });
        }
        Ok(Self(count))
    }

    /// 截断到合法范围（表单输入的处理方式）。
    #[must_use]
    pub fn clamped(count: i64) -> Self {
        let count = count.clamp(MIN_IMAGE_COUNT as i64, MAX_IMAGE_COUNT as i64);
        Self(usize::try_from(count).unwrap_or(MIN_IMAGE_COUNT))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Default for ImageCount {
    fn default() -> Self {
        Self(MIN_IMAGE_COUNT)
    }
}

/// 组装请求 parts：第 0 个永远是文本 prompt（即使为空），随后按输入顺序追加
/// 启用且已填充的参考图。
///
/// # Errors
/// 当 prompt 为空白且没有任何图片进入请求时返回 `EmptyRequest`。
pub fn build_parts<'a, I>(prompt: &str, images: I) -> Result<Vec<Part>>
where
    I: IntoIterator<Item = &'a ReferenceImage>,
{
    let mut parts = vec![Part::text(prompt)];
    parts.extend(images.into_iter().filter_map(ReferenceImage::to_part));

    if parts.len() == 1 && prompt.trim().is_empty() {
        return Err(Error::EmptyRequest);
    }
    Ok(parts)
}

/// 一次生成请求，构建后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    parts: Vec<Part>,
    attached: Vec<String>,
    count: ImageCount,
}

impl GenerationRequest {
    /// 从 prompt 与有序参考图构建。
    ///
    /// # Errors
    /// 当 prompt 与图片都为空时返回 `EmptyRequest`。
    pub fn new<'a, I>(prompt: impl Into<String>, images: I, count: ImageCount) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ReferenceImage>,
    {
        let prompt = prompt.into();
        let images: Vec<&ReferenceImage> = images.into_iter().collect();
        let parts = build_parts(&prompt, images.iter().copied())?;
        let attached = images
            .iter()
            .filter(|image| image.contributes())
            .map(|image| image.id().to_string())
            .collect();
        Ok(Self {
            prompt,
            parts,
            attached,
            count,
        })
    }

    /// 从参考图面板构建（人物 → 产品 → 背景）。
    ///
    /// # Errors
    /// 当 prompt 与图片都为空时返回 `EmptyRequest`。
    pub fn from_board(
        prompt: impl Into<String>,
        board: &ReferenceBoard,
        count: ImageCount,
    ) -> Result<Self> {
        Self::new(prompt, board.images(), count)
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// 有序 parts，第 0 个为 prompt。
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// 进入请求的参考图 id。
    #[must_use]
    pub fn attached_images(&self) -> &[String] {
        &self.attached
    }

    #[must_use]
    pub const fn desired_count(&self) -> usize {
        self.count.get()
    }

    /// 请求 contents（单条不带角色的内容）。
    #[must_use]
    pub fn contents(&self) -> Vec<Content> {
        vec![Content::from_parts(self.parts.clone())]
    }

    /// generateContent 请求体。
    #[must_use]
    pub fn to_wire(&self, generation_config: Option<GenerationConfig>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: self.contents(),
            generation_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::SlotKind;

    fn populated(kind: SlotKind, index: usize, byte: u8) -> ReferenceImage {
        let mut image = ReferenceImage::empty(kind, index);
        image.populate(vec![byte], "image/png");
        image
    }

    #[test]
    fn image_count_range() {
        assert!(ImageCount::new(0).is_err());
        assert!(ImageCount::new(5).is_err());
        assert_eq!(ImageCount::new(4).unwrap().get(), 4);
        assert_eq!(ImageCount::clamped(-3).get(), 1);
        assert_eq!(ImageCount::clamped(9).get(), 4);
        assert_eq!(ImageCount::clamped(2).get(), 2);
    }

    #[test]
    fn blank_prompt_without_images_is_empty_request() {
        let board = ReferenceBoard::new();
        let err = build_parts("  \n\t", board.images()).unwrap_err();
        assert!(matches!(err, Error::EmptyRequest));
    }

    #[test]
    fn enabled_but_unpopulated_images_do_not_satisfy_request() {
        let board = ReferenceBoard::new();
        let err = GenerationRequest::from_board("", &board, ImageCount::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyRequest));
    }

    #[test]
    fn prompt_is_always_first_part() {
        let images = vec![
            populated(SlotKind::Character, 1, 1),
            populated(SlotKind::Product, 1, 2),
            populated(SlotKind::Background, 1, 3),
        ];
        for attached in 0..=images.len() {
            let parts = build_parts("a cat", &images[..attached]).unwrap();
            assert_eq!(parts.len(), attached + 1);
            assert_eq!(parts[0].text_value(), Some("a cat"));
        }
    }

    #[test]
    fn image_alone_satisfies_request() {
        let mut board = ReferenceBoard::new();
        board.set_image("char-1", vec![9], "image/png").unwrap();
        let request = GenerationRequest::from_board("", &board, ImageCount::default()).unwrap();
        assert_eq!(request.parts().len(), 2);
        assert_eq!(request.parts()[0].text_value(), Some(""));
        assert_eq!(request.attached_images(), ["char-1".to_string()]);
    }

    #[test]
    fn parts_follow_board_order_and_skip_disabled() {
        let mut board = ReferenceBoard::new();
        board.set_image("bg-1", vec![3], "image/jpeg").unwrap();
        board.set_image("prod-2", vec![2], "image/png").unwrap();
        board.set_image("char-3", vec![1], "image/webp").unwrap();
        board.set_image("char-4", vec![4], "image/webp").unwrap();
        board.set_enabled("char-4", false).unwrap();

        let request = GenerationRequest::from_board("scene", &board, ImageCount::default()).unwrap();
        let mimes: Vec<&str> = request.parts()[1..]
            .iter()
            .filter_map(|part| part.inline_data_ref())
            .map(|blob| blob.mime_type.as_str())
            .collect();
        assert_eq!(mimes, vec!["image/webp", "image/png", "image/jpeg"]);
        assert_eq!(request.attached_images(), ["char-3", "prod-2", "bg-1"]);
        assert_eq!(board.slot("char-4").unwrap().raw_bytes(), Some(&[4u8][..]));
    }

    #[test]
    fn wire_body_has_single_content() {
        let request =
            GenerationRequest::new("a cat", std::iter::empty(), ImageCount::new(2).unwrap())
                .unwrap();
        let body = request.to_wire(Some(GenerationConfig::image_only()));
        assert_eq!(body.contents.len(), 1);
        assert!(body.contents[0].role.is_none());
        assert_eq!(request.desired_count(), 2);
    }
}
