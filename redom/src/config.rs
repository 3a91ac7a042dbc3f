use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Connection settings, usually read from a `redom.toml` file.
///
/// ```toml
/// [redis]
/// url = "${REDIS_URL}"
/// key_prefix = "myapp"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedomConfig {
    #[serde(default)]
    pub redis: RedisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prepended to every key as `<prefix>:` when non-empty.
    #[serde(default)]
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: String::new(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

impl RedomConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse redom config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Get the Redis URL, expanding a `${VAR}` reference from the environment.
    pub fn redis_url(&self) -> Result<String> {
        let url = self.redis.url.as_str();
        if let Some(var_name) = url.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            std::env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
        } else {
            Ok(url.to_string())
        }
    }
}
