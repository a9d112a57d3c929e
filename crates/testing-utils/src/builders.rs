//! Test data builders for creating test entities

use chrono::{DateTime, Utc};
use taskhub_domain::entities::{Task, TaskStatus};

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task {
                id: 1,
                name: "test_task".to_string(),
                description: None,
                status: TaskStatus::Pending,
                priority: Some(2),
                assigned_to: None,
                created_at: Utc::now(),
                processed_at: None,
                retry_count: 0,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.task.description = Some(description.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.task.priority = Some(priority);
        self
    }

    pub fn without_priority(mut self) -> Self {
        self.task.priority = None;
        self
    }

    pub fn assigned_to(mut self, user: &str) -> Self {
        self.task.assigned_to = Some(user.to_string());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.task.retry_count = retry_count;
        self
    }

    pub fn processed_at(mut self, processed_at: DateTime<Utc>) -> Self {
        self.task.status = TaskStatus::Processed;
        self.task.processed_at = Some(processed_at);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
