use std::sync::Arc;

use taskhub_domain::entities::TaskId;
use taskhub_domain::messaging::{DispatchRow, MessageBroker, ProcessingMessage};
use taskhub_domain::repositories::TaskStore;
use taskhub_domain::value_objects::{Lane, PriorityTier};
use taskhub_errors::TaskHubResult;
use tracing::{debug, error, info, instrument};

use crate::report::DispatchReport;

/// 任务分发器
///
/// 不持有进程内可变状态，可被任意并发调用方共享。
pub struct TaskDispatcher {
    store: Arc<dyn TaskStore>,
    broker: Arc<dyn MessageBroker>,
}

impl TaskDispatcher {
    pub fn new(store: Arc<dyn TaskStore>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { store, broker }
    }

    /// 读取任务并发布到其优先级对应的通道
    ///
    /// 任务不存在时不发布任何消息，返回 `Ok(None)`。
    #[instrument(skip(self))]
    pub async fn enqueue_one(&self, task_id: TaskId) -> TaskHubResult<Option<Lane>> {
        let Some(task) = self.store.find(task_id).await? else {
            debug!("任务不存在，跳过分发: task_id={}", task_id);
            return Ok(None);
        };

        let tier = PriorityTier::resolve(task.priority);
        let lane = tier.lane();
        self.broker
            .publish(lane, &ProcessingMessage::new(task.id))
            .await?;

        info!(
            "任务已分发: task_id={} tier={} lane={}",
            task.id,
            tier.as_str(),
            lane
        );
        Ok(Some(lane))
    }

    /// 按输入顺序分发调用方已读取的 `(id, priority)` 行
    ///
    /// 单行发布失败不会中断后续行，结果中记录成功数与失败明细。
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn enqueue_many(&self, rows: &[DispatchRow]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for row in rows {
            let lane = PriorityTier::resolve(row.priority).lane();
            match self
                .broker
                .publish(lane, &ProcessingMessage::new(row.id))
                .await
            {
                Ok(()) => {
                    debug!("任务已分发: task_id={} lane={}", row.id, lane);
                    report.record_success(lane);
                }
                Err(e) => {
                    error!("任务分发失败: task_id={} lane={} error={}", row.id, lane, e);
                    report.record_failure(row.id, lane, e.to_string());
                }
            }
        }

        info!(
            "批量分发完成: dispatched={} failed={}",
            report.dispatched,
            report.failures.len()
        );
        report
    }

    /// 按存储中的优先级分发全部任务（id 升序）
    #[instrument(skip(self))]
    pub async fn dispatch_all(&self) -> TaskHubResult<DispatchReport> {
        let rows = self.store.find_dispatch_rows().await?;
        let report = self.enqueue_many(&rows).await;
        info!("Dispatched {} tasks by DB priority", report.dispatched);
        Ok(report)
    }
}
