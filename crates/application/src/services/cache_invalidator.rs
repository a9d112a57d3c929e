use std::sync::Arc;

use async_trait::async_trait;
use taskhub_domain::cache::TagAwareCache;
use taskhub_domain::events::TaskMutation;
use taskhub_domain::repositories::TaskMutationListener;
use taskhub_errors::TaskHubResult;
use tracing::{debug, instrument};

use super::task_read_model::TASK_LISTING_TAG;

/// 任务变更后清除列表缓存
///
/// 任何任务的创建、更新或删除都会使整个列表失效，不做逐行修补。
pub struct TaskCacheInvalidator {
    cache: Arc<dyn TagAwareCache>,
}

impl TaskCacheInvalidator {
    pub fn new(cache: Arc<dyn TagAwareCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl TaskMutationListener for TaskCacheInvalidator {
    #[instrument(skip(self, mutation), fields(event = mutation.event_type(), task_id = mutation.entity_id))]
    async fn on_mutation(&self, mutation: &TaskMutation) -> TaskHubResult<()> {
        if !mutation.is_task() {
            return Ok(());
        }

        self.cache.invalidate_tags(&[TASK_LISTING_TAG]).await?;
        debug!(
            "列表缓存已失效: {} task_id={}",
            mutation.event_type(),
            mutation.entity_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taskhub_domain::events::{EntityKind, MutationKind};
    use taskhub_testing_utils::MockTagAwareCache;

    use crate::services::TASK_LISTING_KEY;

    async fn seeded_cache() -> Arc<MockTagAwareCache> {
        let cache = Arc::new(MockTagAwareCache::new());
        cache
            .set(TASK_LISTING_KEY, b"[]", &[TASK_LISTING_TAG], Duration::from_secs(60))
            .await
            .unwrap();
        cache
    }

    #[tokio::test]
    async fn test_every_task_mutation_evicts_listing() {
        for mutation in [
            TaskMutation::created(1),
            TaskMutation::updated(1),
            TaskMutation::deleted(1),
        ] {
            let cache = seeded_cache().await;
            let invalidator = TaskCacheInvalidator::new(cache.clone());

            invalidator.on_mutation(&mutation).await.unwrap();

            assert!(!cache.contains(TASK_LISTING_KEY), "{:?}", mutation.kind);
        }
    }

    #[tokio::test]
    async fn test_other_entities_are_ignored() {
        let cache = seeded_cache().await;
        let invalidator = TaskCacheInvalidator::new(cache.clone());
        let mut mutation = TaskMutation::task(MutationKind::Updated, 1);
        mutation.entity = EntityKind::Other("user".to_string());

        invalidator.on_mutation(&mutation).await.unwrap();

        assert!(cache.contains(TASK_LISTING_KEY));
    }

    #[tokio::test]
    async fn test_cache_failure_is_reported() {
        let invalidator = TaskCacheInvalidator::new(Arc::new(MockTagAwareCache::failing()));
        assert!(invalidator
            .on_mutation(&TaskMutation::created(1))
            .await
            .is_err());
    }
}
