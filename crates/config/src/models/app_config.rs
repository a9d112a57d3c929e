use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    cache::CacheConfig, fixtures::FixturesConfig, logging::ObservabilityConfig,
    message_queue::BrokerConfig, worker::WorkerConfig,
};
use crate::validation::ConfigValidator;
use crate::ConfigError;

/// 环境变量前缀，例如 `TASKHUB_WORKER__WORKERS_PER_LANE=4`
pub const ENV_PREFIX: &str = "TASKHUB";

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/taskhub.toml", "taskhub.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub broker: BrokerConfig,
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
    pub fixtures: FixturesConfig,
}

impl AppConfig {
    /// 按 默认值 → TOML 文件 → 环境变量 的顺序叠加配置
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate().context("配置验证失败")?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate().context("配置验证失败")?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

fn section(name: &str, result: crate::ConfigResult<()>) -> crate::ConfigResult<()> {
    result.map_err(|e| ConfigError::Validation(format!("[{name}] {e}")))
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        section("cache", self.cache.validate())?;
        section("broker", self.broker.validate())?;
        section("worker", self.worker.validate())?;
        section("observability", self.observability.validate())?;
        section("fixtures", self.fixtures.validate())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheBackend, OutputFormat};

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.listing_ttl_seconds, 600);
        assert_eq!(config.fixtures.seed_count, 50);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [cache]
            backend = "redis"
            redis_url = "redis://cache:6379"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.listing_ttl_seconds, 600);
        assert_eq!(config.observability.log_format, OutputFormat::Json);
        assert_eq!(config.worker.workers_per_lane, 2);
    }

    #[test]
    fn test_invalid_section_is_named() {
        let err = AppConfig::from_toml("[worker]\nworkers_per_lane = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("[worker]"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.broker.max_redeliveries, config.broker.max_redeliveries);
        assert_eq!(parsed.cache.key_prefix, config.cache.key_prefix);
    }
}
