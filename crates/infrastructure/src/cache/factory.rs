//! Cache backend factory

use std::sync::Arc;
use taskhub_config::{CacheBackend, CacheConfig};
use taskhub_domain::cache::TagAwareCache;
use taskhub_errors::TaskHubResult;
use tracing::info;

use super::{InMemoryTagAwareCache, RedisTagAwareCache};

/// 按配置创建缓存后端
pub async fn create_cache(config: &CacheConfig) -> TaskHubResult<Arc<dyn TagAwareCache>> {
    match config.backend {
        CacheBackend::Memory => {
            info!("Using in-memory cache backend");
            Ok(Arc::new(InMemoryTagAwareCache::new()))
        }
        CacheBackend::Redis => {
            let cache = RedisTagAwareCache::connect(&config.redis_url, &config.key_prefix).await?;
            Ok(Arc::new(cache))
        }
    }
}
