use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            _ => Err(format!(
                "Invalid cache backend: {s}. Valid backends: memory, redis"
            )),
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Redis => write!(f, "redis"),
        }
    }
}

/// 列表读模型使用的缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Redis 键前缀，内存后端忽略
    pub key_prefix: String,
    pub listing_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "taskhub".to_string(),
            listing_ttl_seconds: 600,
        }
    }
}

impl CacheConfig {
    pub fn listing_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.listing_ttl_seconds)
    }
}

impl ConfigValidator for CacheConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.listing_ttl_seconds == 0 {
            return Err(crate::ConfigError::Validation(
                "cache.listing_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.backend == CacheBackend::Redis {
            ValidationUtils::validate_url(&self.redis_url, "cache.redis_url")?;
            ValidationUtils::validate_not_empty(&self.key_prefix, "cache.key_prefix")?;
        }

        Ok(())
    }
}
