use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use taskhub_config::BrokerConfig;
use taskhub_domain::messaging::{Delivery, MessageBroker, ProcessingMessage};
use taskhub_domain::value_objects::Lane;
use taskhub_errors::{TaskHubError, TaskHubResult};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 内存消息队列实现
///
/// 每个通道一个先进先出队列，提供至少一次投递语义：
/// 取出的消息在确认之前处于投递中状态，超过可见性超时后重新入队；
/// 重投次数超过上限的消息进入死信。
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    lanes: HashMap<Lane, LaneQueue>,
    config: BrokerConfig,
}

#[derive(Debug, Default)]
struct LaneQueue {
    state: Mutex<LaneState>,
    /// 有新消息入队时唤醒等待中的消费者
    notify: Notify,
}

#[derive(Debug, Default)]
struct LaneState {
    ready: VecDeque<Pending>,
    in_flight: HashMap<Uuid, InFlight>,
    published: u64,
    acked: u64,
    redelivered: u64,
    dead_lettered: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    message: ProcessingMessage,
    attempt: u32,
}

#[derive(Debug)]
struct InFlight {
    pending: Pending,
    deadline: Instant,
}

/// 单个通道的统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneStats {
    pub lane: Lane,
    pub ready: usize,
    pub in_flight: usize,
    pub published: u64,
    pub acked: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
}

/// 队列统计信息
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub lanes: Vec<LaneStats>,
}

impl QueueStats {
    pub fn lane(&self, lane: Lane) -> Option<&LaneStats> {
        self.lanes.iter().find(|s| s.lane == lane)
    }

    pub fn total_dead_lettered(&self) -> u64 {
        self.lanes.iter().map(|s| s.dead_lettered).sum()
    }
}

impl LaneState {
    /// 重新入队或转入死信，返回是否重新入队
    fn requeue_or_dead_letter(&mut self, pending: Pending, max_redeliveries: u32, lane: Lane) -> bool {
        if pending.attempt > max_redeliveries {
            self.dead_lettered += 1;
            warn!(
                "消息超过最大重投次数，进入死信: lane={} task_id={} attempts={}",
                lane, pending.message.task_id, pending.attempt
            );
            return false;
        }

        self.redelivered += 1;
        self.ready.push_back(Pending {
            message: pending.message,
            attempt: pending.attempt + 1,
        });
        true
    }

    /// 回收超过可见性超时仍未确认的投递
    fn reclaim_expired(&mut self, now: Instant, max_redeliveries: u32, lane: Lane) -> usize {
        let expired: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut requeued = 0;
        for id in expired {
            if let Some(flight) = self.in_flight.remove(&id) {
                debug!(
                    "投递超时未确认: lane={} task_id={} delivery={}",
                    lane, flight.pending.message.task_id, id
                );
                if self.requeue_or_dead_letter(flight.pending, max_redeliveries, lane) {
                    requeued += 1;
                }
            }
        }
        requeued
    }
}

impl InMemoryMessageQueue {
    /// 创建新的内存消息队列实例
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// 使用指定配置创建内存消息队列实例
    pub fn with_config(config: BrokerConfig) -> Self {
        info!("Creating in-memory message queue with config: {:?}", config);
        let lanes = Lane::ALL
            .iter()
            .map(|lane| (*lane, LaneQueue::default()))
            .collect();
        Self { lanes, config }
    }

    fn lane_queue(&self, lane: Lane) -> TaskHubResult<&LaneQueue> {
        self.lanes
            .get(&lane)
            .ok_or_else(|| TaskHubError::transport_error(lane.as_str(), "lane not registered"))
    }

    /// 获取队列统计信息
    pub async fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for lane in Lane::ALL {
            if let Some(queue) = self.lanes.get(&lane) {
                let state = queue.state.lock().await;
                stats.lanes.push(LaneStats {
                    lane,
                    ready: state.ready.len(),
                    in_flight: state.in_flight.len(),
                    published: state.published,
                    acked: state.acked,
                    redelivered: state.redelivered,
                    dead_lettered: state.dead_lettered,
                });
            }
        }
        stats
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageQueue {
    async fn publish(&self, lane: Lane, message: &ProcessingMessage) -> TaskHubResult<()> {
        let queue = self.lane_queue(lane)?;
        {
            let mut state = queue.state.lock().await;
            if self.config.max_lane_depth > 0 && state.ready.len() >= self.config.max_lane_depth {
                warn!("通道已满，拒绝消息: lane={} task_id={}", lane, message.task_id);
                return Err(TaskHubError::transport_error(
                    lane.as_str(),
                    format!("lane is full ({} messages)", self.config.max_lane_depth),
                ));
            }
            state.ready.push_back(Pending {
                message: *message,
                attempt: 1,
            });
            state.published += 1;
        }
        queue.notify.notify_one();

        debug!("Published message to lane '{}': task_id={}", lane, message.task_id);
        Ok(())
    }

    async fn receive(&self, lane: Lane, timeout: Duration) -> TaskHubResult<Option<Delivery>> {
        let queue = self.lane_queue(lane)?;
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut state = queue.state.lock().await;
                let now = Instant::now();
                if state.reclaim_expired(now, self.config.max_redeliveries, lane) > 0 {
                    queue.notify.notify_one();
                }

                if let Some(pending) = state.ready.pop_front() {
                    let delivery = Delivery::new(lane, pending.message, pending.attempt);
                    state.in_flight.insert(
                        delivery.id,
                        InFlight {
                            pending,
                            deadline: now + self.config.visibility_timeout(),
                        },
                    );
                    debug!(
                        "Delivered message from lane '{}': task_id={} attempt={}",
                        lane, pending.message.task_id, pending.attempt
                    );
                    return Ok(Some(delivery));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // 投递中的消息可能在等待期间超时，等待时长不超过可见性超时
            let wait = (deadline - now).min(self.config.visibility_timeout());
            let _ = tokio::time::timeout(wait, queue.notify.notified()).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> TaskHubResult<()> {
        let queue = self.lane_queue(delivery.lane)?;
        let mut state = queue.state.lock().await;
        if state.in_flight.remove(&delivery.id).is_some() {
            state.acked += 1;
        } else {
            debug!(
                "确认的投递已不在处理中: lane={} delivery={}",
                delivery.lane, delivery.id
            );
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> TaskHubResult<()> {
        let queue = self.lane_queue(delivery.lane)?;
        let requeued = {
            let mut state = queue.state.lock().await;
            match state.in_flight.remove(&delivery.id) {
                Some(flight) if requeue => state.requeue_or_dead_letter(
                    flight.pending,
                    self.config.max_redeliveries,
                    delivery.lane,
                ),
                Some(_) => {
                    state.dead_lettered += 1;
                    warn!(
                        "消息被拒绝且不重新入队: lane={} task_id={}",
                        delivery.lane, delivery.message.task_id
                    );
                    false
                }
                None => false,
            }
        };
        if requeued {
            queue.notify.notify_one();
        }
        Ok(())
    }

    async fn lane_depth(&self, lane: Lane) -> TaskHubResult<usize> {
        let queue = self.lane_queue(lane)?;
        let state = queue.state.lock().await;
        Ok(state.ready.len() + state.in_flight.len())
    }
}
