use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskhub_errors::TaskHubResult;
use uuid::Uuid;

use crate::entities::TaskId;
use crate::value_objects::Lane;

/// 通过 Broker 传递的唯一载荷
///
/// 不携带优先级：优先级只在入队时决定通道。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProcessingMessage {
    pub task_id: TaskId,
}

impl ProcessingMessage {
    pub fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }
}

/// 调用方预先查出的 `(id, priority)` 行，用于批量分发
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchRow {
    pub id: TaskId,
    #[serde(default)]
    pub priority: Option<i64>,
}

impl DispatchRow {
    pub fn new(id: TaskId, priority: Option<i64>) -> Self {
        Self { id, priority }
    }
}

/// 一次投递：同一条消息在重投时会产生新的 `Delivery`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    pub id: Uuid,
    pub lane: Lane,
    pub message: ProcessingMessage,
    /// 从 1 开始，第 n 次投递
    pub attempt: u32,
    pub delivered_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(lane: Lane, message: ProcessingMessage, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            lane,
            message,
            attempt,
            delivered_at: Utc::now(),
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }
}

/// 至少一次语义的消息传输，按通道命名
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// 发布消息到指定通道
    async fn publish(&self, lane: Lane, message: &ProcessingMessage) -> TaskHubResult<()>;

    /// 从通道取出一条消息，超时仍为空时返回 `None`
    async fn receive(&self, lane: Lane, timeout: Duration) -> TaskHubResult<Option<Delivery>>;

    /// 确认消息处理完成
    async fn ack(&self, delivery: &Delivery) -> TaskHubResult<()>;

    /// 拒绝消息，`requeue` 为真时重新入队
    async fn nack(&self, delivery: &Delivery, requeue: bool) -> TaskHubResult<()>;

    /// 通道中尚未确认的消息数量，包括待投递和投递中的消息
    async fn lane_depth(&self, lane: Lane) -> TaskHubResult<usize>;
}

/// 订阅通道的消费方
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ProcessingMessage) -> TaskHubResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_row_priority_is_optional() {
        let rows: Vec<DispatchRow> =
            serde_json::from_str(r#"[{"id":1,"priority":3},{"id":6}]"#).unwrap();
        assert_eq!(rows[0], DispatchRow::new(1, Some(3)));
        assert_eq!(rows[1], DispatchRow::new(6, None));
    }

    #[test]
    fn test_processing_message_carries_only_task_id() {
        let json = serde_json::to_value(ProcessingMessage::new(12)).unwrap();
        assert_eq!(json, serde_json::json!({ "task_id": 12 }));
    }

    #[test]
    fn test_redelivery_flag() {
        let first = Delivery::new(Lane::Default, ProcessingMessage::new(1), 1);
        let second = Delivery::new(Lane::Default, ProcessingMessage::new(1), 2);
        assert!(!first.is_redelivery());
        assert!(second.is_redelivery());
        assert_ne!(first.id, second.id);
    }
}
