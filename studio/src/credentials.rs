//! API key handling and the local credential cache.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};

/// 凭据在持久化存储中的固定键名。
pub const CREDENTIAL_KEY: &str = "GEMINI_API_KEY";
const DEFAULT_STORE_DIR: &str = "gemini-studio";
const DEFAULT_STORE_FILE: &str = "credentials.json";

/// 用户提供的 API Key。
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// 创建凭据（去除首尾空白；空白 key 视为缺失）。
    ///
    /// # Errors
    /// 当 key 为空或全为空白时返回 `MissingCredential`。
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingCredential {
                message: "API key is empty".into(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 从环境变量读取（`GEMINI_API_KEY`，其次 `GOOGLE_API_KEY`）。
    ///
    /// # Errors
    /// 当两个变量都缺失或为空时返回 `MissingCredential`。
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .ok_or_else(|| Error::MissingCredential {
                message: "GEMINI_API_KEY or GOOGLE_API_KEY not found".into(),
            })?;
        Self::new(key)
    }

    /// 原始 key，仅用于注入请求头。
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 打码后的 key，适合展示。
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// 凭据存储：同步、进程级、无过期。
pub trait CredentialStore: Send + Sync {
    /// 读取已保存的凭据。
    ///
    /// # Errors
    /// 当存储不可读或内容损坏时返回错误。
    fn load(&self) -> Result<Option<Credential>>;

    /// 保存凭据（覆盖旧值）。
    ///
    /// # Errors
    /// 当存储不可写时返回错误。
    fn save(&self, credential: &Credential) -> Result<()>;
}

/// 读取凭据，缺失时返回 `MissingCredential`，调用方应先引导用户完成设置。
///
/// # Errors
/// 当存储读取失败或没有保存凭据时返回错误。
pub fn require_credential(store: &dyn CredentialStore) -> Result<Credential> {
    store.load()?.ok_or_else(|| Error::MissingCredential {
        message: "no API key saved; run the key setup first".into(),
    })
}

/// 以 JSON 文件保存单条凭据（明文，无加密）。
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// 使用指定文件路径。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 使用平台配置目录下的默认位置。
    ///
    /// # Errors
    /// 当平台没有可用的配置目录时返回错误。
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| Error::InvalidConfig {
            message: "no configuration directory available on this platform".into(),
        })?;
        Ok(Self::new(dir.join(DEFAULT_STORE_DIR).join(DEFAULT_STORE_FILE)))
    }

    /// 存储文件路径。
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|err| Error::Parse {
                message: format!("credential store {} is corrupt: {err}", self.path.display()),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(CREDENTIAL_KEY)
            .and_then(|value| Credential::new(value.as_str()).ok()))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(CREDENTIAL_KEY.to_string(), credential.expose().to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, payload)?;
        tracing::debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }
}

/// 内存凭据存储。
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// 以已有凭据初始化。
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        let guard = self.credential.read().map_err(|_| Error::InvalidConfig {
            message: "credential store lock poisoned".into(),
        })?;
        Ok(guard.clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut guard = self.credential.write().map_err(|_| Error::InvalidConfig {
            message: "credential store lock poisoned".into(),
        })?;
        *guard = Some(credential.clone());
        Ok(())
    }
}
