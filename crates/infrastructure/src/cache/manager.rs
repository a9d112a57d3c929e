//! In-memory tag-aware cache implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use taskhub_domain::cache::{CacheStats, TagAwareCache};
use taskhub_errors::TaskHubResult;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::TagStamp;

#[derive(Debug)]
struct CacheEntry {
    value: Vec<u8>,
    tags: Vec<TagStamp>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).copied().unwrap_or(0)
    }

    fn is_live(&self, entry: &CacheEntry, now: Instant) -> bool {
        entry.expires_at > now
            && entry
                .tags
                .iter()
                .all(|stamp| self.generation(&stamp.tag) == stamp.generation)
    }
}

/// 进程内标签缓存
#[derive(Debug, Default)]
pub struct InMemoryTagAwareCache {
    state: RwLock<CacheState>,
    stats: RwLock<CacheStats>,
}

impl InMemoryTagAwareCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的条目数（含尚未清理的过期条目）
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TagAwareCache for InMemoryTagAwareCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> TaskHubResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let value = {
            let mut state = self.state.write().await;
            let live = state.entries.get(key).map(|entry| state.is_live(entry, now));
            match live {
                Some(true) => state.entries.get(key).map(|entry| entry.value.clone()),
                Some(false) => {
                    state.entries.remove(key);
                    None
                }
                None => None,
            }
        };

        let mut stats = self.stats.write().await;
        if value.is_some() {
            debug!("Cache HIT: {}", key);
            stats.hits += 1;
        } else {
            debug!("Cache MISS: {}", key);
            stats.misses += 1;
        }
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        tags: &[&str],
        ttl: Duration,
    ) -> TaskHubResult<()> {
        {
            let mut state = self.state.write().await;
            let stamps = tags
                .iter()
                .map(|tag| TagStamp {
                    tag: tag.to_string(),
                    generation: state.generation(tag),
                })
                .collect();
            state.entries.insert(
                key.to_string(),
                CacheEntry {
                    value: value.to_vec(),
                    tags: stamps,
                    expires_at: Instant::now() + ttl,
                },
            );
        }

        debug!("Cache SET: {} with TTL: {:?}", key, ttl);
        self.stats.write().await.sets += 1;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> TaskHubResult<bool> {
        let removed = self.state.write().await.entries.remove(key).is_some();
        self.stats.write().await.deletes += 1;
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn invalidate_tags(&self, tags: &[&str]) -> TaskHubResult<()> {
        let evicted = {
            let mut state = self.state.write().await;
            for tag in tags {
                *state.generations.entry(tag.to_string()).or_insert(0) += 1;
            }
            let before = state.entries.len();
            state
                .entries
                .retain(|_, entry| !entry.tags.iter().any(|s| tags.contains(&s.tag.as_str())));
            before - state.entries.len()
        };

        debug!("Cache INVALIDATE tags={:?} evicted={}", tags, evicted);
        self.stats.write().await.invalidations += 1;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }
}
