//! Relay configuration: a small TOML file, every field optional.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use gemini_studio::transport::{DEFAULT_API_VERSION, DEFAULT_BASE_URL};
use serde::Deserialize;

/// Environment variable overriding `listen`.
pub const LISTEN_ENV: &str = "GEMINI_RELAY_LISTEN";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub upstream_base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upstream_base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or contains unknown fields
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GEMINI_RELAY_LISTEN` if set and non-blank
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not a socket address
    pub fn apply_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Some(listen) = std::env::var(LISTEN_ENV).ok().filter(|value| !value.trim().is_empty()) {
            self.listen = listen
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {LISTEN_ENV} value '{listen}': {e}"))?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.upstream_base_url.trim().is_empty() {
            anyhow::bail!("upstream_base_url must not be empty");
        }
        if self.api_version.trim().is_empty() {
            anyhow::bail!("api_version must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
