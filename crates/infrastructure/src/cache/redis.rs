//! Redis tag-aware cache implementation
//!
//! 条目保存为 Redis hash：`payload` 存放原始字节，`tags` 存放写入时的标签代数（JSON）。
//! 每个标签的代数保存在独立计数键中，失效即对计数键执行 `INCR`。

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use taskhub_domain::cache::{CacheStats, TagAwareCache};
use taskhub_errors::{TaskHubError, TaskHubResult};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use super::TagStamp;

/// Redis cache with per-tag generation counters
pub struct RedisTagAwareCache {
    conn: ConnectionManager,
    stats: RwLock<CacheStats>,
    key_prefix: String,
}

impl RedisTagAwareCache {
    /// 连接 Redis 并执行 PING 检查
    pub async fn connect(redis_url: &str, key_prefix: &str) -> TaskHubResult<Self> {
        info!("Creating Redis tag-aware cache with URL: {}", redis_url);

        let client = redis::Client::open(redis_url).map_err(redis_error)?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(redis_error)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        info!("Redis tag-aware cache created successfully");

        Ok(Self {
            conn,
            stats: RwLock::new(CacheStats::default()),
            key_prefix: key_prefix.to_string(),
        })
    }

    fn entry_key(&self, key: &str) -> String {
        prefixed(&self.key_prefix, "entry", key)
    }

    fn tag_key(&self, tag: &str) -> String {
        prefixed(&self.key_prefix, "tag", tag)
    }

    async fn current_generations(&self, tags: &[String]) -> TaskHubResult<Vec<u64>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = tags.iter().map(|t| self.tag_key(t)).collect();
        let mut conn = self.conn.clone();
        let generations: Vec<Option<u64>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(generations.into_iter().map(|g| g.unwrap_or(0)).collect())
    }

    async fn record_error(&self, e: TaskHubError) -> TaskHubError {
        self.stats.write().await.errors += 1;
        e
    }

    async fn get_inner(&self, full_key: &str) -> TaskHubResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let (payload, tags): (Option<Vec<u8>>, Option<String>) = redis::cmd("HMGET")
            .arg(full_key)
            .arg("payload")
            .arg("tags")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        let (Some(payload), Some(tags)) = (payload, tags) else {
            return Ok(None);
        };

        let stamps: Vec<TagStamp> = serde_json::from_str(&tags)?;
        let names: Vec<String> = stamps.iter().map(|s| s.tag.clone()).collect();
        let current = self.current_generations(&names).await?;
        let live = stamps
            .iter()
            .zip(current.iter())
            .all(|(stamp, generation)| stamp.generation == *generation);

        Ok(live.then_some(payload))
    }

    async fn set_inner(
        &self,
        full_key: &str,
        value: &[u8],
        tags: &[&str],
        ttl: Duration,
    ) -> TaskHubResult<()> {
        let names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let current = self.current_generations(&names).await?;
        let stamps: Vec<TagStamp> = names
            .into_iter()
            .zip(current)
            .map(|(tag, generation)| TagStamp { tag, generation })
            .collect();
        let stamps = serde_json::to_string(&stamps)?;

        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(full_key)
            .ignore()
            .cmd("HSET")
            .arg(full_key)
            .arg("payload")
            .arg(value)
            .arg("tags")
            .arg(stamps)
            .ignore()
            .cmd("PEXPIRE")
            .arg(full_key)
            .arg(ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

fn prefixed(prefix: &str, kind: &str, name: &str) -> String {
    if prefix.is_empty() {
        format!("{kind}:{name}")
    } else {
        format!("{prefix}:{kind}:{name}")
    }
}

/// PEXPIRE 的毫秒参数：至少 1ms，超出 u64 时取上限
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn redis_error(e: redis::RedisError) -> TaskHubError {
    TaskHubError::cache_error(e.to_string())
}

#[async_trait]
impl TagAwareCache for RedisTagAwareCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> TaskHubResult<Option<Vec<u8>>> {
        let full_key = self.entry_key(key);
        match self.get_inner(&full_key).await {
            Ok(Some(value)) => {
                debug!("Cache HIT: {}", full_key);
                self.stats.write().await.hits += 1;
                Ok(Some(value))
            }
            Ok(None) => {
                debug!("Cache MISS: {}", full_key);
                self.stats.write().await.misses += 1;
                Ok(None)
            }
            Err(e) => {
                error!("Cache GET failed for key {}: {}", full_key, e);
                Err(self.record_error(e).await)
            }
        }
    }

    #[instrument(skip(self, value))]
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        tags: &[&str],
        ttl: Duration,
    ) -> TaskHubResult<()> {
        let full_key = self.entry_key(key);
        debug!("Cache SET: {} with TTL: {:?}", full_key, ttl);

        if let Err(e) = self.set_inner(&full_key, value, tags, ttl).await {
            error!("Cache SET failed for key {}: {}", full_key, e);
            return Err(self.record_error(e).await);
        }

        self.stats.write().await.sets += 1;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> TaskHubResult<bool> {
        let full_key = self.entry_key(key);
        let mut conn = self.conn.clone();
        let removed: i64 = match redis::cmd("DEL").arg(&full_key).query_async(&mut conn).await {
            Ok(n) => n,
            Err(e) => {
                error!("Cache DELETE failed for key {}: {}", full_key, e);
                return Err(self.record_error(redis_error(e)).await);
            }
        };

        self.stats.write().await.deletes += 1;
        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn invalidate_tags(&self, tags: &[&str]) -> TaskHubResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for tag in tags {
            pipe.cmd("INCR").arg(self.tag_key(tag)).ignore();
        }

        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        if let Err(e) = result {
            error!("Cache INVALIDATE failed for tags {:?}: {}", tags, e);
            return Err(self.record_error(redis_error(e)).await);
        }

        debug!("Cache INVALIDATE tags={:?}", tags);
        self.stats.write().await.invalidations += 1;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(prefixed("taskhub", "entry", "task.list"), "taskhub:entry:task.list");
        assert_eq!(prefixed("taskhub", "tag", "task.all"), "taskhub:tag:task.all");
        assert_eq!(prefixed("", "tag", "task.all"), "tag:task.all");
    }

    #[test]
    fn test_ttl_millis_bounds() {
        assert_eq!(ttl_millis(Duration::from_secs(600)), 600_000);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_invalid_url_is_cache_error() {
        let result = RedisTagAwareCache::connect("not a url", "taskhub").await;
        assert!(matches!(result, Err(TaskHubError::Cache(_))));
    }
}
