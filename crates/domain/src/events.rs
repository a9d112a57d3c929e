//! 领域事件
//!
//! 存储在每次提交之后发出的变更通知，取代 ORM 生命周期钩子

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::TaskId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

/// 被变更实体的类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMutation {
    pub kind: MutationKind,
    pub entity: EntityKind,
    pub entity_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

impl TaskMutation {
    pub fn task(kind: MutationKind, task_id: TaskId) -> Self {
        Self {
            kind,
            entity: EntityKind::Task,
            entity_id: task_id,
            occurred_at: Utc::now(),
        }
    }

    pub fn created(task_id: TaskId) -> Self {
        Self::task(MutationKind::Created, task_id)
    }

    pub fn updated(task_id: TaskId) -> Self {
        Self::task(MutationKind::Updated, task_id)
    }

    pub fn deleted(task_id: TaskId) -> Self {
        Self::task(MutationKind::Deleted, task_id)
    }

    pub fn is_task(&self) -> bool {
        self.entity == EntityKind::Task
    }

    pub fn event_type(&self) -> &'static str {
        match self.kind {
            MutationKind::Created => "task.created",
            MutationKind::Updated => "task.updated",
            MutationKind::Deleted => "task.deleted",
        }
    }
}
