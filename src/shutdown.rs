use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 优雅关闭管理器
#[derive(Clone)]
pub struct ShutdownManager {
    /// 关闭信号发送器，关闭后置空
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 已经关闭，返回一个立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭，重复调用无副作用
    pub async fn shutdown(&self) {
        let mut shutdown_tx = self.shutdown_tx.write().await;
        let Some(tx) = shutdown_tx.take() else {
            debug!("关闭管理器已经触发过关闭");
            return;
        };

        debug!("发送关闭信号给 {} 个订阅者", tx.receiver_count());
        // 可能没有接收者
        let _ = tx.send(());
        info!("关闭信号已发送");
    }

    pub async fn is_shutdown(&self) -> bool {
        self.shutdown_tx.read().await.is_none()
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscribers_receive_signal() {
        let manager = ShutdownManager::new();
        let mut rx1 = manager.subscribe().await;
        let mut rx2 = manager.subscribe().await;

        manager.shutdown().await;

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
        assert!(manager.is_shutdown().await);
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_fires_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;
        manager.shutdown().await;

        let mut rx = manager.subscribe().await;
        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(received, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let manager = ShutdownManager::new();
        let clone = manager.clone();
        let mut rx = manager.subscribe().await;

        clone.shutdown().await;

        assert!(rx.recv().await.is_ok());
        assert!(manager.is_shutdown().await);
    }
}
