use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId, // 由存储在创建时分配
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<i64>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>, // 当且仅当 status == Processed 时存在
    pub retry_count: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Task {
    pub fn new(name: impl Into<String>, priority: Option<i64>) -> Self {
        Self {
            id: 0, // 将由存储生成
            name: name.into(),
            description: None,
            status: TaskStatus::Pending,
            priority,
            assigned_to: None,
            created_at: Utc::now(),
            processed_at: None,
            retry_count: 0,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self.status, TaskStatus::Processed)
    }

    /// 单调且幂等的 pending → processed 迁移
    ///
    /// 已处理的任务保持原有的 `processed_at`，返回 `false`。
    pub fn mark_processed(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_processed() {
            return false;
        }
        self.status = TaskStatus::Processed;
        self.processed_at = Some(now);
        true
    }

    pub fn entity_description(&self) -> String {
        format!("任务 '{}' (ID: {}, 状态: {})", self.name, self.id, self.status)
    }
}

/// 列表读模型中的一行，只存在于缓存里，总是整体重建
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskListItem {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<i64>,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
    pub retry_count: i32,
    pub done: bool,
}

/// 时间戳的规范文本形式：RFC 3339，秒级精度，`+00:00` 偏移
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

impl From<&Task> for TaskListItem {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            priority: task.priority,
            assigned_to: task.assigned_to.clone(),
            created_at: canonical_timestamp(&task.created_at),
            processed_at: task.processed_at.as_ref().map(canonical_timestamp),
            retry_count: task.retry_count,
            done: task.is_processed(),
        }
    }
}

/// 读模型结果的来源，每次调用恰好是其中之一
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    Cache,
    Recomputed,
}

impl ListingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSource::Cache => "cache",
            ListingSource::Recomputed => "recomputed",
        }
    }
}

impl fmt::Display for ListingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskListing {
    pub items: Vec<TaskListItem>,
    pub source: ListingSource,
}
