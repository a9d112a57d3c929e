use std::sync::Arc;
use std::time::Duration;

use taskhub_domain::cache::{TagAwareCache, TagAwareCacheExt};
use taskhub_domain::entities::{ListingSource, TaskListItem, TaskListing};
use taskhub_domain::repositories::TaskStore;
use taskhub_errors::TaskHubResult;
use tracing::{debug, info, instrument};

/// 任务列表在缓存中的键
pub const TASK_LISTING_KEY: &str = "task.list";
/// 所有任务共享的失效标签
pub const TASK_LISTING_TAG: &str = "task.all";
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(600);

/// 旁路缓存的任务列表读模型
///
/// 命中时直接返回缓存；未命中或缓存不可用时从存储按创建时间倒序重建，
/// 并以共享标签回填缓存。
pub struct TaskReadModel {
    store: Arc<dyn TaskStore>,
    cache: Arc<dyn TagAwareCache>,
    ttl: Duration,
}

impl TaskReadModel {
    pub fn new(store: Arc<dyn TaskStore>, cache: Arc<dyn TagAwareCache>) -> Self {
        Self::with_ttl(store, cache, DEFAULT_LISTING_TTL)
    }

    pub fn with_ttl(store: Arc<dyn TaskStore>, cache: Arc<dyn TagAwareCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    #[instrument(skip(self))]
    pub async fn list_with_source(&self) -> TaskHubResult<TaskListing> {
        let store = self.store.clone();
        let outcome = self
            .cache
            .get_or_compute(TASK_LISTING_KEY, &[TASK_LISTING_TAG], self.ttl, || async move {
                let tasks = store.find_all_ordered_by_created_at_desc().await?;
                Ok(tasks.iter().map(TaskListItem::from).collect::<Vec<_>>())
            })
            .await?;

        let source = if outcome.from_cache {
            ListingSource::Cache
        } else {
            ListingSource::Recomputed
        };
        debug!("任务列表: items={} source={}", outcome.value.len(), source);

        Ok(TaskListing {
            items: outcome.value,
            source,
        })
    }

    /// 强制清除缓存的任务列表，缓存错误会返回给调用方
    #[instrument(skip(self))]
    pub async fn invalidate_all(&self) -> TaskHubResult<()> {
        self.cache.delete(TASK_LISTING_KEY).await?;
        self.cache.invalidate_tags(&[TASK_LISTING_TAG]).await?;
        info!("任务列表缓存已清除");
        Ok(())
    }
}
