//! 领域仓储抽象
//!
//! 存储是任务的唯一事实来源，其引擎实现不属于核心

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskhub_errors::TaskHubResult;

use crate::entities::{Task, TaskId};
use crate::events::TaskMutation;
use crate::messaging::DispatchRow;

/// 任务存储抽象
///
/// 实现必须在每次提交 create/save/mark_processed/delete 之后回调已注册的 [`TaskMutationListener`]。
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find(&self, id: TaskId) -> TaskHubResult<Option<Task>>;
    async fn find_all_ordered_by_created_at_desc(&self) -> TaskHubResult<Vec<Task>>;
    /// 按 id 升序返回 `(id, priority)` 行
    async fn find_dispatch_rows(&self) -> TaskHubResult<Vec<DispatchRow>>;
    async fn create(&self, task: Task) -> TaskHubResult<Task>;
    /// 更新已存在的任务，任务不存在时返回 `TaskNotFound`
    async fn save(&self, task: &Task) -> TaskHubResult<()>;
    /// 在同一次写入中检查并执行 pending → processed
    ///
    /// 任务不存在返回 `None`；已处理返回 `Some(false)` 且不做任何写入，
    /// 并发调用中只有一个会得到 `Some(true)`。
    async fn mark_processed(&self, id: TaskId, at: DateTime<Utc>) -> TaskHubResult<Option<bool>>;
    async fn delete(&self, id: TaskId) -> TaskHubResult<bool>;
}

/// 存储提交后的变更通知
#[async_trait]
pub trait TaskMutationListener: Send + Sync {
    async fn on_mutation(&self, mutation: &TaskMutation) -> TaskHubResult<()>;
}
