use std::sync::Arc;
use std::time::Duration;

use taskhub_config::WorkerConfig;
use taskhub_domain::messaging::{Delivery, MessageBroker, MessageHandler};
use taskhub_domain::value_objects::Lane;
use taskhub_errors::{TaskHubError, TaskHubResult};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// 工作池统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub handled: u64,
    pub acked: u64,
    pub requeued: u64,
    pub rejected: u64,
    pub receive_errors: u64,
}

/// 按通道订阅消息的工作池
///
/// 每个通道启动 `workers_per_lane` 个消费循环，所有循环共享同一个处理器。
/// 处理成功即确认；可重试的错误重新入队，其余错误直接拒绝。
pub struct LaneWorkerPool {
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn MessageHandler>,
    config: WorkerConfig,
    stats: Arc<RwLock<WorkerStats>>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    is_running: RwLock<bool>,
}

impl LaneWorkerPool {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            broker,
            handler,
            config,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            is_running: RwLock::new(false),
        }
    }

    pub async fn start(&self) -> TaskHubResult<()> {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return Err(TaskHubError::Internal(
                "Worker pool already running".to_string(),
            ));
        }

        let mut handles = self.handles.lock().await;
        for lane in Lane::ALL {
            for index in 0..self.config.workers_per_lane {
                let span = tracing::info_span!("lane_worker", lane = %lane, index);
                let worker = Self::run_worker(
                    lane,
                    self.broker.clone(),
                    self.handler.clone(),
                    self.stats.clone(),
                    self.config.poll_timeout(),
                    self.shutdown_tx.subscribe(),
                );
                handles.push(tokio::spawn(worker.instrument(span)));
            }
        }

        *is_running = true;
        info!(
            "工作池已启动: lanes={} workers_per_lane={}",
            Lane::ALL.len(),
            self.config.workers_per_lane
        );
        Ok(())
    }

    /// 发送关闭信号并等待所有消费循环退出
    ///
    /// 正在处理的消息会先处理完毕。
    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        if !*is_running {
            return;
        }

        info!("停止工作池");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("消费循环异常退出: {}", e);
            }
        }

        *is_running = false;
        info!("工作池已停止");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn stats(&self) -> WorkerStats {
        self.stats.read().await.clone()
    }

    /// 等待所有通道都没有未确认的消息，超时返回 `false`
    pub async fn wait_until_drained(&self, timeout: Duration) -> TaskHubResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut pending = 0;
            for lane in Lane::ALL {
                pending += self.broker.lane_depth(lane).await?;
            }
            if pending == 0 {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("等待通道清空超时: pending={}", pending);
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn run_worker(
        lane: Lane,
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
        stats: Arc<RwLock<WorkerStats>>,
        poll_timeout: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        debug!("消费循环启动: lane={}", lane);
        loop {
            let received = tokio::select! {
                _ = shutdown_rx.recv() => break,
                received = broker.receive(lane, poll_timeout) => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    Self::handle_delivery(&*broker, &*handler, &stats, &delivery).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("接收消息失败: lane={} error={}", lane, e);
                    stats.write().await.receive_errors += 1;
                    tokio::time::sleep(poll_timeout).await;
                }
            }
        }
        debug!("消费循环退出: lane={}", lane);
    }

    async fn handle_delivery(
        broker: &dyn MessageBroker,
        handler: &dyn MessageHandler,
        stats: &RwLock<WorkerStats>,
        delivery: &Delivery,
    ) {
        let task_id = delivery.message.task_id;
        if delivery.is_redelivery() {
            debug!("重复投递: task_id={} attempt={}", task_id, delivery.attempt);
        }

        let result = handler.handle(&delivery.message).await;
        stats.write().await.handled += 1;

        let settled = match result {
            Ok(()) => {
                let acked = broker.ack(delivery).await;
                if acked.is_ok() {
                    stats.write().await.acked += 1;
                }
                acked
            }
            Err(e) if e.is_retryable() => {
                warn!("处理失败，重新入队: task_id={} error={}", task_id, e);
                stats.write().await.requeued += 1;
                broker.nack(delivery, true).await
            }
            Err(e) => {
                error!("处理失败，拒绝消息: task_id={} error={}", task_id, e);
                stats.write().await.rejected += 1;
                broker.nack(delivery, false).await
            }
        };

        if let Err(e) = settled {
            error!("消息确认失败: task_id={} error={}", task_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskhub_domain::messaging::ProcessingMessage;
    use taskhub_testing_utils::{MockMessageBroker, TestEnv};

    struct ScriptedHandler {
        calls: AtomicUsize,
        error: Option<fn() -> TaskHubError>,
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle(&self, _message: &ProcessingMessage) -> TaskHubResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.error {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig {
            workers_per_lane: 1,
            poll_timeout_ms: 10,
        }
    }

    async fn run_one(error: Option<fn() -> TaskHubError>) -> (Arc<MockMessageBroker>, WorkerStats) {
        let broker = Arc::new(MockMessageBroker::new());
        broker
            .publish(Lane::High, &ProcessingMessage::new(1))
            .await
            .unwrap();
        let handler = Arc::new(ScriptedHandler {
            calls: AtomicUsize::new(0),
            error,
        });

        let pool = LaneWorkerPool::new(broker.clone(), handler.clone(), config());
        pool.start().await.unwrap();
        let done = TestEnv::wait_for(
            || {
                let handler = handler.clone();
                async move { handler.calls.load(Ordering::SeqCst) == 1 }
            },
            Duration::from_secs(2),
        )
        .await;
        assert!(done);
        pool.stop().await;
        (broker, pool.stats().await)
    }

    #[tokio::test]
    async fn test_success_is_acked() {
        let (broker, stats) = run_one(None).await;
        assert_eq!(broker.acked().len(), 1);
        assert!(broker.nacked().is_empty());
        assert_eq!(stats.acked, 1);
    }

    #[tokio::test]
    async fn test_retryable_error_is_requeued() {
        let (broker, stats) = run_one(Some(|| TaskHubError::store_error("down"))).await;
        assert_eq!(broker.nacked().len(), 1);
        assert!(broker.nacked()[0].1);
        assert_eq!(stats.requeued, 1);
    }

    #[tokio::test]
    async fn test_permanent_error_is_rejected() {
        let (broker, stats) =
            run_one(Some(|| TaskHubError::Internal("bad".to_string()))).await;
        assert_eq!(broker.nacked().len(), 1);
        assert!(!broker.nacked()[0].1);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_start_twice_fails_and_stop_is_idempotent() {
        let broker = Arc::new(MockMessageBroker::new());
        let handler = Arc::new(ScriptedHandler {
            calls: AtomicUsize::new(0),
            error: None,
        });
        let pool = LaneWorkerPool::new(broker, handler, config());

        pool.start().await.unwrap();
        assert!(pool.is_running().await);
        assert!(pool.start().await.is_err());

        pool.stop().await;
        pool.stop().await;
        assert!(!pool.is_running().await);
    }
}
