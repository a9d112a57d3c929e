use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use taskhub_application::{TaskCacheInvalidator, TaskReadModel};
use taskhub_config::AppConfig;
use taskhub_dispatcher::{DispatchReport, TaskDispatcher};
use taskhub_domain::entities::{ListingSource, TaskListing};
use taskhub_domain::value_objects::Lane;
use taskhub_infrastructure::{create_cache, InMemoryMessageQueue, InMemoryTaskStore};
use taskhub_worker::{LaneWorkerPool, TaskProcessor};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::fixtures;

/// 演示模式下等待所有通道清空的最长时间
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 写入演示任务、全部分发、等待处理完成后退出
    Demo,
    /// 启动工作池并持续运行，直到收到关闭信号
    Serve,
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "demo" => Ok(AppMode::Demo),
            "serve" => Ok(AppMode::Serve),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {s}")),
        }
    }
}

/// 演示运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub seeded: usize,
    pub dispatch: DispatchReport,
    pub drained: bool,
    pub processed: usize,
    /// 每次读取任务列表时的来源，按读取顺序
    pub sources: Vec<ListingSource>,
}

/// 读取来源在命令行输出中的描述
pub fn describe_source(source: ListingSource) -> &'static str {
    match source {
        ListingSource::Cache => "loaded from cache",
        ListingSource::Recomputed => "loaded from store and cached",
    }
}

/// 主应用程序
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    store: Arc<InMemoryTaskStore>,
    broker: Arc<InMemoryMessageQueue>,
    dispatcher: TaskDispatcher,
    pool: LaneWorkerPool,
    read_model: TaskReadModel,
}

impl Application {
    /// 按配置组装存储、缓存、消息代理与工作池
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let cache = create_cache(&config.cache)
            .await
            .with_context(|| format!("创建缓存失败: backend={}", config.cache.backend))?;

        let store = Arc::new(InMemoryTaskStore::new());
        store
            .subscribe(Arc::new(TaskCacheInvalidator::new(cache.clone())))
            .await;

        let broker = Arc::new(InMemoryMessageQueue::with_config(config.broker.clone()));
        let dispatcher = TaskDispatcher::new(store.clone(), broker.clone());
        let processor = Arc::new(TaskProcessor::new(store.clone()));
        let pool = LaneWorkerPool::new(broker.clone(), processor, config.worker.clone());
        let read_model =
            TaskReadModel::with_ttl(store.clone(), cache, config.cache.listing_ttl());

        Ok(Self {
            config,
            mode,
            store,
            broker,
            dispatcher,
            pool,
            read_model,
        })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn store(&self) -> Arc<InMemoryTaskStore> {
        self.store.clone()
    }

    pub fn broker(&self) -> Arc<InMemoryMessageQueue> {
        self.broker.clone()
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    pub fn read_model(&self) -> &TaskReadModel {
        &self.read_model
    }

    /// 运行应用程序
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Demo => {
                let summary = self.run_demo(shutdown_rx).await?;
                info!(
                    "演示完成: seeded={} dispatched={} processed={} drained={}",
                    summary.seeded, summary.dispatch.dispatched, summary.processed, summary.drained
                );
            }
            AppMode::Serve => {
                self.run_serve(shutdown_rx).await?;
            }
        }

        Ok(())
    }

    /// 写入演示任务并全部分发，等待各通道清空后返回
    ///
    /// 分发前读取两次列表（重建、命中），处理完成后再读取一次。
    pub async fn run_demo(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<DemoSummary> {
        let seeded = fixtures::seed(self.store.as_ref(), self.config.fixtures.seed_count)
            .await
            .context("写入演示任务失败")?;

        self.pool.start().await.context("启动工作池失败")?;

        let mut sources = Vec::new();
        sources.push(self.show_listing().await?.source);
        sources.push(self.show_listing().await?.source);

        let dispatch = self.dispatcher.dispatch_all().await.context("分发任务失败")?;
        println!(
            "Dispatched {} tasks by DB priority ({} failed)",
            dispatch.dispatched,
            dispatch.failures.len()
        );

        let drained = tokio::select! {
            drained = self.pool.wait_until_drained(DRAIN_TIMEOUT) => drained.context("查询通道深度失败")?,
            _ = shutdown_rx.recv() => {
                info!("演示模式收到关闭信号");
                false
            }
        };
        if !drained {
            warn!("通道未清空，停止演示");
        }
        self.pool.stop().await;
        self.log_broker_stats().await;

        let listing = self.show_listing().await?;
        sources.push(listing.source);
        let processed = listing.items.iter().filter(|item| item.done).count();

        Ok(DemoSummary {
            seeded,
            dispatch,
            drained,
            processed,
            sources,
        })
    }

    /// 写入演示任务、分发一次，然后持续消费直到收到关闭信号
    async fn run_serve(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        fixtures::seed(self.store.as_ref(), self.config.fixtures.seed_count)
            .await
            .context("写入演示任务失败")?;

        self.pool.start().await.context("启动工作池失败")?;
        let report = self.dispatcher.dispatch_all().await.context("分发任务失败")?;
        info!(
            "Dispatched {} tasks by DB priority, lanes={:?}",
            report.dispatched,
            report.lane_counts()
        );

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号，停止工作池");

        self.pool.stop().await;
        self.log_broker_stats().await;
        let stats = self.pool.stats().await;
        info!(
            "工作池统计: handled={} acked={} requeued={} rejected={}",
            stats.handled, stats.acked, stats.requeued, stats.rejected
        );
        Ok(())
    }

    async fn show_listing(&self) -> Result<TaskListing> {
        let listing = self
            .read_model
            .list_with_source()
            .await
            .context("读取任务列表失败")?;
        let done = listing.items.iter().filter(|item| item.done).count();
        println!(
            "{} tasks ({} done), {}",
            listing.items.len(),
            done,
            describe_source(listing.source)
        );
        Ok(listing)
    }

    async fn log_broker_stats(&self) {
        let stats = self.broker.stats().await;
        for lane in Lane::ALL {
            if let Some(lane_stats) = stats.lane(lane) {
                info!("通道统计: lane={} {:?}", lane, lane_stats);
            }
        }
        if stats.total_dead_lettered() > 0 {
            warn!("死信消息数: {}", stats.total_dead_lettered());
        }
    }
}
