//! Reference image slots (character, product, background).

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gemini_studio_types::content::Part;

use crate::error::{Error, Result};

/// 参考图槽位类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Character,
    Product,
    Background,
}

impl SlotKind {
    /// 槽位 id 前缀。
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Character => "char",
            Self::Product => "prod",
            Self::Background => "bg",
        }
    }

    /// 该类型的固定槽位数。
    #[must_use]
    pub const fn capacity(self) -> usize {
        match self {
            Self::Character => 4,
            Self::Product => 2,
            Self::Background => 1,
        }
    }

    /// 请求中的排列顺序：人物 → 产品 → 背景。
    pub const ORDER: [Self; 3] = [Self::Character, Self::Product, Self::Background];
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Character => "character",
            Self::Product => "product",
            Self::Background => "background",
        };
        f.write_str(name)
    }
}

/// 单个参考图槽位。
///
/// 原始字节与 base64 payload 同时存在或同时缺失；槽位只会被替换，不会被删除。
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    id: String,
    kind: SlotKind,
    raw_bytes: Option<Vec<u8>>,
    encoded_payload: Option<String>,
    mime_type: Option<String>,
    enabled: bool,
}

impl ReferenceImage {
    /// 创建空槽位（默认启用）。`index` 从 1 开始。
    #[must_use]
    pub fn empty(kind: SlotKind, index: usize) -> Self {
        Self {
            id: format!("{}-{index}", kind.prefix()),
            kind,
            raw_bytes: None,
            encoded_payload: None,
            mime_type: None,
            enabled: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn kind(&self) -> SlotKind {
        self.kind
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.raw_bytes.is_some()
    }

    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    #[must_use]
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.raw_bytes.as_deref()
    }

    #[must_use]
    pub fn encoded_payload(&self) -> Option<&str> {
        self.encoded_payload.as_deref()
    }

    /// 启用/禁用，不影响已保存的图片数据。
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// 用原始字节填充槽位；填充会重新启用槽位。
    pub fn populate(&mut self, bytes: Vec<u8>, mime_type: impl Into<String>) {
        self.encoded_payload = Some(STANDARD.encode(&bytes));
        self.raw_bytes = Some(bytes);
        self.mime_type = Some(mime_type.into());
        self.enabled = true;
    }

    /// 用 base64 payload 填充槽位。
    ///
    /// # Errors
    /// 当 payload 不是合法 base64 时返回错误。
    pub fn populate_encoded(
        &mut self,
        payload: impl AsRef<str>,
        mime_type: impl Into<String>,
    ) -> Result<()> {
        let compact: String = payload.as_ref().split_whitespace().collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|err| Error::Parse {
                message: format!("invalid base64 payload for {}: {err}", self.id),
            })?;
        self.populate(bytes, mime_type);
        Ok(())
    }

    /// 从文件读取并填充，MIME 按扩展名推断。
    ///
    /// # Errors
    /// 当路径不是文件、读取失败或文件不是图片时返回错误。
    pub async fn populate_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidConfig {
                message: format!("{} is not a valid file path", path.display()),
            });
        }
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        if !mime_type.starts_with("image/") {
            return Err(Error::InvalidConfig {
                message: format!("{} is not an image ({mime_type})", path.display()),
            });
        }
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(slot = %self.id, mime_type = %mime_type, size = bytes.len(), "loaded reference image");
        self.populate(bytes, mime_type);
        Ok(())
    }

    /// 是否会进入请求：必须启用且已填充。
    #[must_use]
    pub const fn contributes(&self) -> bool {
        self.enabled && self.raw_bytes.is_some() && self.mime_type.is_some()
    }

    /// 转为请求 part；不参与请求时返回 `None`。
    #[must_use]
    pub fn to_part(&self) -> Option<Part> {
        if !self.contributes() {
            return None;
        }
        match (&self.raw_bytes, &self.mime_type) {
            (Some(bytes), Some(mime_type)) => Some(Part::inline_data(bytes.clone(), mime_type)),
            _ => None,
        }
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bytes", &self.raw_bytes.as_ref().map(Vec::len))
            .field("mime_type", &self.mime_type)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// 全部参考图槽位：4 个人物、2 个产品、1 个背景，顺序固定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceBoard {
    slots: Vec<ReferenceImage>,
}

impl Default for ReferenceBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceBoard {
    /// 创建全部为空的槽位。
    #[must_use]
    pub fn new() -> Self {
        let slots = SlotKind::ORDER
            .into_iter()
            .flat_map(|kind| (1..=kind.capacity()).map(move |index| ReferenceImage::empty(kind, index)))
            .collect();
        Self { slots }
    }

    /// 按请求顺序排列的全部槽位。
    #[must_use]
    pub fn images(&self) -> &[ReferenceImage] {
        &self.slots
    }

    /// 某一类型的槽位。
    pub fn slots_of(&self, kind: SlotKind) -> impl Iterator<Item = &ReferenceImage> {
        self.slots.iter().filter(move |slot| slot.kind == kind)
    }

    #[must_use]
    pub fn slot(&self, id: &str) -> Option<&ReferenceImage> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    /// 可变访问槽位。
    ///
    /// # Errors
    /// 当槽位 id 不存在时返回错误。
    pub fn slot_mut(&mut self, id: &str) -> Result<&mut ReferenceImage> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .ok_or_else(|| Error::InvalidConfig {
                message: format!("unknown reference slot: {id}"),
            })
    }

    /// 替换槽位图片。
    ///
    /// # Errors
    /// 当槽位 id 不存在时返回错误。
    pub fn set_image(&mut self, id: &str, bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<()> {
        self.slot_mut(id)?.populate(bytes, mime_type);
        Ok(())
    }

    /// 切换槽位启用状态。
    ///
    /// # Errors
    /// 当槽位 id 不存在时返回错误。
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.slot_mut(id)?.set_enabled(enabled);
        Ok(())
    }

    /// 从文件填充槽位。
    ///
    /// # Errors
    /// 当槽位 id 不存在或文件读取失败时返回错误。
    pub async fn load_image(&mut self, id: &str, path: impl AsRef<Path>) -> Result<()> {
        self.slot_mut(id)?.populate_from_path(path).await
    }

    /// 第一个空槽位的 id。
    #[must_use]
    pub fn next_free(&self, kind: SlotKind) -> Option<&str> {
        self.slots_of(kind)
            .find(|slot| !slot.is_populated())
            .map(ReferenceImage::id)
    }

    /// 会进入请求的图片数量。
    #[must_use]
    pub fn contributing_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.contributes()).count()
    }
}
