use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use taskhub_domain::entities::{Task, TaskId};
use taskhub_domain::events::TaskMutation;
use taskhub_domain::messaging::DispatchRow;
use taskhub_domain::repositories::{TaskMutationListener, TaskStore};
use taskhub_errors::{TaskHubError, TaskHubResult};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 内存任务存储
///
/// 以 id 为键保存任务，写操作提交后依次通知已注册的变更监听器。
/// 监听器失败只记录日志，不影响已提交的写入。
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    next_id: AtomicI64,
    listeners: RwLock<Vec<Arc<dyn TaskMutationListener>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册变更监听器
    pub async fn subscribe(&self, listener: Arc<dyn TaskMutationListener>) {
        self.listeners.write().await.push(listener);
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn notify(&self, mutation: TaskMutation) {
        let listeners = self.listeners.read().await.clone();
        debug!(
            "任务变更通知: {} task_id={} listeners={}",
            mutation.event_type(),
            mutation.entity_id,
            listeners.len()
        );

        for listener in listeners {
            if let Err(e) = listener.on_mutation(&mutation).await {
                warn!(
                    "变更监听器执行失败: {} task_id={} error={}",
                    mutation.event_type(),
                    mutation.entity_id,
                    e
                );
            }
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find(&self, id: TaskId) -> TaskHubResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_all_ordered_by_created_at_desc(&self) -> TaskHubResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        // created_at 相同时按 id 降序
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn find_dispatch_rows(&self) -> TaskHubResult<Vec<DispatchRow>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .map(|task| DispatchRow::new(task.id, task.priority))
            .collect())
    }

    async fn create(&self, mut task: Task) -> TaskHubResult<Task> {
        task.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.tasks.write().await.insert(task.id, task.clone());

        self.notify(TaskMutation::created(task.id)).await;
        Ok(task)
    }

    async fn save(&self, task: &Task) -> TaskHubResult<()> {
        {
            let mut tasks = self.tasks.write().await;
            match tasks.get_mut(&task.id) {
                Some(existing) => *existing = task.clone(),
                None => return Err(TaskHubError::task_not_found(task.id)),
            }
        }

        self.notify(TaskMutation::updated(task.id)).await;
        Ok(())
    }

    async fn mark_processed(&self, id: TaskId, at: DateTime<Utc>) -> TaskHubResult<Option<bool>> {
        let transitioned = {
            let mut tasks = self.tasks.write().await;
            match tasks.get_mut(&id) {
                Some(task) => task.mark_processed(at),
                None => return Ok(None),
            }
        };

        if transitioned {
            self.notify(TaskMutation::updated(id)).await;
        }
        Ok(Some(transitioned))
    }

    async fn delete(&self, id: TaskId) -> TaskHubResult<bool> {
        let removed = self.tasks.write().await.remove(&id).is_some();
        if removed {
            self.notify(TaskMutation::deleted(id)).await;
        }
        Ok(removed)
    }
}
