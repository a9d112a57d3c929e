use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use taskhub_domain::messaging::{MessageHandler, ProcessingMessage};
use taskhub_domain::repositories::TaskStore;
use taskhub_errors::TaskHubResult;
use tracing::{debug, info, instrument};

/// 一次处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 任务由 pending 转为 processed
    Processed,
    /// 任务此前已处理，未做任何修改
    AlreadyProcessed,
    /// 任务不存在（已被删除）
    Missing,
}

/// 幂等的任务处理器
///
/// 重复投递、乱序投递以及与删除的竞争都不会产生可观察的差异。
pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
}

impl TaskProcessor {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, message), fields(task_id = message.task_id))]
    pub async fn process(&self, message: &ProcessingMessage) -> TaskHubResult<ProcessOutcome> {
        let Some(task) = self.store.find(message.task_id).await? else {
            debug!("任务不存在，忽略消息: task_id={}", message.task_id);
            return Ok(ProcessOutcome::Missing);
        };

        if task.is_processed() {
            debug!("任务已处理，忽略重复投递: task_id={}", task.id);
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        // 读取之后可能有并发投递抢先完成迁移，或任务被删除
        match self.store.mark_processed(task.id, Utc::now()).await? {
            Some(true) => {
                info!("任务处理完成: task_id={}", task.id);
                Ok(ProcessOutcome::Processed)
            }
            Some(false) => {
                debug!("并发投递已完成处理: task_id={}", task.id);
                Ok(ProcessOutcome::AlreadyProcessed)
            }
            None => {
                debug!("任务在写入前被删除: task_id={}", task.id);
                Ok(ProcessOutcome::Missing)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for TaskProcessor {
    async fn handle(&self, message: &ProcessingMessage) -> TaskHubResult<()> {
        self.process(message).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use taskhub_domain::entities::TaskStatus;
    use taskhub_errors::TaskHubError;
    use taskhub_testing_utils::{MockTaskStore, TaskBuilder};

    fn processor_with(store: &Arc<MockTaskStore>) -> TaskProcessor {
        TaskProcessor::new(store.clone())
    }

    #[tokio::test]
    async fn test_pending_task_becomes_processed() {
        let store = Arc::new(MockTaskStore::with_tasks(vec![TaskBuilder::new()
            .with_id(1)
            .build()]));
        let processor = processor_with(&store);

        let before = Utc::now();
        let outcome = processor.process(&ProcessingMessage::new(1)).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Processed);
        let task = store.get(1).unwrap();
        assert_eq!(task.status, TaskStatus::Processed);
        assert!(task.processed_at.unwrap() >= before);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_processing_twice_keeps_first_timestamp() {
        let store = Arc::new(MockTaskStore::with_tasks(vec![TaskBuilder::new()
            .with_id(1)
            .build()]));
        let processor = processor_with(&store);

        processor.process(&ProcessingMessage::new(1)).await.unwrap();
        let first = store.get(1).unwrap().processed_at;

        let outcome = processor.process(&ProcessingMessage::new(1)).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
        assert_eq!(store.get(1).unwrap().processed_at, first);
        assert_eq!(store.get(1).unwrap().status, TaskStatus::Processed);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_already_processed_task_is_untouched() {
        let at = Utc::now() - Duration::days(1);
        let store = Arc::new(MockTaskStore::with_tasks(vec![TaskBuilder::new()
            .with_id(4)
            .processed_at(at)
            .build()]));
        let processor = processor_with(&store);

        let outcome = processor.process(&ProcessingMessage::new(4)).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
        assert_eq!(store.get(4).unwrap().processed_at, Some(at));
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_task_performs_no_writes() {
        let store = Arc::new(MockTaskStore::new());
        let processor = processor_with(&store);

        let outcome = processor.process(&ProcessingMessage::new(99)).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Missing);
        assert_eq!(store.save_calls(), 0);
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_task_deleted_before_save_is_noop() {
        let store = Arc::new(MockTaskStore::with_tasks(vec![TaskBuilder::new()
            .with_id(2)
            .build()]));
        store.vanish_on_save(true);
        let processor = processor_with(&store);

        let outcome = processor.process(&ProcessingMessage::new(2)).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Missing);
        assert!(store.get(2).is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MockTaskStore::with_tasks(vec![TaskBuilder::new()
            .with_id(1)
            .build()]));
        store.fail_reads(true);
        let processor = processor_with(&store);

        let err = processor
            .handle(&ProcessingMessage::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskHubError::Store(_)));
        assert!(err.is_retryable());
    }
}
