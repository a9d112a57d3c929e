use std::time::Duration;

use anyhow::Result;
use taskhub_domain::cache::{TagAwareCache, TagAwareCacheExt};
use taskhub_infrastructure::RedisTagAwareCache;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

const PREFIX: &str = "taskhub-it";
const TTL: Duration = Duration::from_secs(60);

/// Redis 容器与连接到它的缓存
struct RedisCacheSetup {
    _container: ContainerAsync<Redis>,
    redis_url: String,
    cache: RedisTagAwareCache,
}

impl RedisCacheSetup {
    async fn new() -> Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;
        let port = container.get_host_port_ipv4(6379).await?;
        let redis_url = format!("redis://127.0.0.1:{port}");
        let cache = RedisTagAwareCache::connect(&redis_url, PREFIX).await?;

        Ok(Self {
            _container: container,
            redis_url,
            cache,
        })
    }

    async fn raw_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(self.redis_url.as_str())?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}

#[tokio::test]
#[ignore] // 需要 Docker 运行 Redis 容器
async fn test_set_then_get_hits() -> Result<()> {
    let setup = RedisCacheSetup::new().await?;
    let cache = &setup.cache;

    cache.set("k", b"payload", &["task.all"], TTL).await?;

    assert_eq!(cache.get("k").await?, Some(b"payload".to_vec()));
    assert_eq!(cache.get("missing").await?, None);

    let stats = cache.stats().await;
    assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
    Ok(())
}

#[tokio::test]
#[ignore] // 需要 Docker 运行 Redis 容器
async fn test_invalidate_tag_then_set_again() -> Result<()> {
    let setup = RedisCacheSetup::new().await?;
    let cache = &setup.cache;

    cache.set("tagged", b"1", &["task.all"], TTL).await?;
    cache.set("other", b"2", &["other"], TTL).await?;

    cache.invalidate_tags(&["task.all"]).await?;

    assert!(cache.get("tagged").await?.is_none());
    assert_eq!(cache.get("other").await?, Some(b"2".to_vec()));

    // 失效后写入的条目记录新的代数，可以命中
    cache.set("tagged", b"3", &["task.all"], TTL).await?;
    assert_eq!(cache.get("tagged").await?, Some(b"3".to_vec()));

    let mut conn = setup.raw_connection().await?;
    let generation: u64 = redis::cmd("GET")
        .arg(format!("{PREFIX}:tag:task.all"))
        .query_async(&mut conn)
        .await?;
    assert_eq!(generation, 1);
    Ok(())
}

#[tokio::test]
#[ignore] // 需要 Docker 运行 Redis 容器
async fn test_entry_expires_after_ttl() -> Result<()> {
    let setup = RedisCacheSetup::new().await?;
    let cache = &setup.cache;

    cache
        .set("short", b"v", &["task.all"], Duration::from_millis(200))
        .await?;

    let mut conn = setup.raw_connection().await?;
    let pttl: i64 = redis::cmd("PTTL")
        .arg(format!("{PREFIX}:entry:short"))
        .query_async(&mut conn)
        .await?;
    assert!(pttl > 0 && pttl <= 200, "unexpected PTTL {pttl}");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(cache.get("short").await?.is_none());
    Ok(())
}

#[tokio::test]
#[ignore] // 需要 Docker 运行 Redis 容器
async fn test_delete_and_get_or_compute() -> Result<()> {
    let setup = RedisCacheSetup::new().await?;
    let cache = &setup.cache;

    let first = cache
        .get_or_compute("listing", &["task.all"], TTL, || async { Ok(vec![1, 2, 3]) })
        .await?;
    let second = cache
        .get_or_compute("listing", &["task.all"], TTL, || async {
            Ok::<Vec<i32>, taskhub_errors::TaskHubError>(vec![9])
        })
        .await?;
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.value, vec![1, 2, 3]);

    assert!(cache.delete("listing").await?);
    assert!(!cache.delete("listing").await?);
    assert!(cache.get("listing").await?.is_none());
    Ok(())
}
