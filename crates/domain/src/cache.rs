//! 支持标签失效的缓存抽象
//!
//! 缓存只保存可随时丢弃的派生副本，从来不是事实来源。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use taskhub_errors::TaskHubResult;
use tracing::{debug, warn};

/// Cache statistics and metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub invalidations: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Tag-aware cache service
///
/// 失效一个标签之后，该标签下此前写入的所有条目在后续读取时都必须未命中。
#[async_trait]
pub trait TagAwareCache: Send + Sync {
    /// Get a value from cache as raw bytes
    async fn get(&self, key: &str) -> TaskHubResult<Option<Vec<u8>>>;

    /// Set a value tagged with `tags`, expiring after `ttl`
    async fn set(&self, key: &str, value: &[u8], tags: &[&str], ttl: Duration)
        -> TaskHubResult<()>;

    /// Delete a single key
    async fn delete(&self, key: &str) -> TaskHubResult<bool>;

    /// Evict every entry written under any of `tags`
    async fn invalidate_tags(&self, tags: &[&str]) -> TaskHubResult<()>;

    /// Get cache statistics
    async fn stats(&self) -> CacheStats;
}

/// `get_or_compute` 的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Extension trait for typed access and cache-aside reads
#[async_trait]
pub trait TagAwareCacheExt: Send + Sync {
    async fn get_typed<T>(&self, key: &str) -> TaskHubResult<Option<T>>
    where
        T: DeserializeOwned + Send;

    async fn set_typed<T>(
        &self,
        key: &str,
        value: &T,
        tags: &[&str],
        ttl: Duration,
    ) -> TaskHubResult<()>
    where
        T: Serialize + Sync;

    /// 命中时返回缓存值；未命中时调用 `compute` 并回填
    ///
    /// 缓存读写失败一律按未命中处理，只有 `compute` 的错误会向上传播。
    async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        tags: &[&str],
        ttl: Duration,
        compute: F,
    ) -> TaskHubResult<CacheOutcome<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = TaskHubResult<T>> + Send;
}

#[async_trait]
impl<C: TagAwareCache + ?Sized> TagAwareCacheExt for C {
    async fn get_typed<T>(&self, key: &str) -> TaskHubResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_typed<T>(
        &self,
        key: &str,
        value: &T,
        tags: &[&str],
        ttl: Duration,
    ) -> TaskHubResult<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, &bytes, tags, ttl).await
    }

    async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        tags: &[&str],
        ttl: Duration,
        compute: F,
    ) -> TaskHubResult<CacheOutcome<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = TaskHubResult<T>> + Send,
    {
        match self.get_typed::<T>(key).await {
            Ok(Some(value)) => {
                debug!("Cache HIT: {}", key);
                return Ok(CacheOutcome {
                    value,
                    from_cache: true,
                });
            }
            Ok(None) => debug!("Cache MISS: {}", key),
            Err(e) => warn!("缓存读取失败，按未命中处理: key={}, error={}", key, e),
        }

        let value = compute().await?;

        if let Err(e) = self.set_typed(key, &value, tags, ttl).await {
            warn!("缓存回填失败: key={}, error={}", key, e);
        }

        Ok(CacheOutcome {
            value,
            from_cache: false,
        })
    }
}
