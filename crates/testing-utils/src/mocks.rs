//! Mock implementations for the store, broker and cache traits
//!
//! 这些实现只保存在内存中，并记录调用次数以便断言；部分实现支持注入故障。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskhub_domain::cache::{CacheStats, TagAwareCache};
use taskhub_domain::entities::{Task, TaskId};
use taskhub_domain::events::TaskMutation;
use taskhub_domain::messaging::{Delivery, DispatchRow, MessageBroker, ProcessingMessage};
use taskhub_domain::repositories::{TaskMutationListener, TaskStore};
use taskhub_domain::value_objects::Lane;
use taskhub_errors::{TaskHubError, TaskHubResult};

/// Mock implementation of TaskStore for testing
///
/// 不通知变更监听器；需要监听语义的测试使用基础设施层的内存存储。
#[derive(Debug, Clone, Default)]
pub struct MockTaskStore {
    tasks: Arc<Mutex<BTreeMap<TaskId, Task>>>,
    next_id: Arc<Mutex<TaskId>>,
    find_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    save_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    vanish_on_save: Arc<AtomicBool>,
}

impl MockTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        {
            let mut map = store.tasks.lock().unwrap();
            let mut max_id = 0;
            for task in tasks {
                max_id = max_id.max(task.id);
                map.insert(task.id, task);
            }
            *store.next_id.lock().unwrap() = max_id;
        }
        store
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// save 与 mark_processed 的写入调用次数
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// 之后的所有读取都返回存储错误
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 模拟任务在读取与写入之间被并发删除
    pub fn vanish_on_save(&self, vanish: bool) {
        self.vanish_on_save.store(vanish, Ordering::SeqCst);
    }

    fn check_reads(&self) -> TaskHubResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TaskHubError::store_error("injected read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MockTaskStore {
    async fn find(&self, id: TaskId) -> TaskHubResult<Option<Task>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn find_all_ordered_by_created_at_desc(&self) -> TaskHubResult<Vec<Task>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let mut tasks: Vec<Task> = self.tasks.lock().unwrap().values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn find_dispatch_rows(&self) -> TaskHubResult<Vec<DispatchRow>> {
        self.check_reads()?;
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .values()
            .map(|t| DispatchRow::new(t.id, t.priority))
            .collect())
    }

    async fn create(&self, mut task: Task) -> TaskHubResult<Task> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        task.id = *next_id;
        self.tasks.lock().unwrap().insert(task.id, task.clone());
        Ok(task)
    }

    async fn save(&self, task: &Task) -> TaskHubResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().unwrap();
        if self.vanish_on_save.load(Ordering::SeqCst) {
            tasks.remove(&task.id);
        }
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(TaskHubError::task_not_found(task.id)),
        }
    }

    async fn mark_processed(&self, id: TaskId, at: DateTime<Utc>) -> TaskHubResult<Option<bool>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().unwrap();
        if self.vanish_on_save.load(Ordering::SeqCst) {
            tasks.remove(&id);
        }
        Ok(tasks.get_mut(&id).map(|task| task.mark_processed(at)))
    }

    async fn delete(&self, id: TaskId) -> TaskHubResult<bool> {
        Ok(self.tasks.lock().unwrap().remove(&id).is_some())
    }
}

/// Mock implementation of MessageBroker for testing
///
/// 记录每次发布，可针对指定任务注入投递失败。
#[derive(Debug, Clone, Default)]
pub struct MockMessageBroker {
    published: Arc<Mutex<Vec<(Lane, ProcessingMessage)>>>,
    queues: Arc<Mutex<HashMap<Lane, VecDeque<ProcessingMessage>>>>,
    acked: Arc<Mutex<Vec<Delivery>>>,
    nacked: Arc<Mutex<Vec<(Delivery, bool)>>>,
    failing_tasks: Arc<Mutex<HashSet<TaskId>>>,
}

impl MockMessageBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布该任务的消息时返回投递错误
    pub fn fail_for(&self, task_id: TaskId) {
        self.failing_tasks.lock().unwrap().insert(task_id);
    }

    pub fn published(&self) -> Vec<(Lane, ProcessingMessage)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_lanes(&self) -> Vec<Lane> {
        self.published().into_iter().map(|(lane, _)| lane).collect()
    }

    pub fn acked(&self) -> Vec<Delivery> {
        self.acked.lock().unwrap().clone()
    }

    pub fn nacked(&self) -> Vec<(Delivery, bool)> {
        self.nacked.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroker for MockMessageBroker {
    async fn publish(&self, lane: Lane, message: &ProcessingMessage) -> TaskHubResult<()> {
        if self.failing_tasks.lock().unwrap().contains(&message.task_id) {
            return Err(TaskHubError::transport_error(
                lane.as_str(),
                "injected publish failure",
            ));
        }
        self.published.lock().unwrap().push((lane, *message));
        self.queues
            .lock()
            .unwrap()
            .entry(lane)
            .or_default()
            .push_back(*message);
        Ok(())
    }

    async fn receive(&self, lane: Lane, timeout: Duration) -> TaskHubResult<Option<Delivery>> {
        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&lane)
            .and_then(|q| q.pop_front());
        match next {
            Some(message) => Ok(Some(Delivery::new(lane, message, 1))),
            None => {
                tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
                Ok(None)
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> TaskHubResult<()> {
        self.acked.lock().unwrap().push(delivery.clone());
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, requeue: bool) -> TaskHubResult<()> {
        self.nacked.lock().unwrap().push((delivery.clone(), requeue));
        Ok(())
    }

    async fn lane_depth(&self, lane: Lane) -> TaskHubResult<usize> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(&lane)
            .map(|q| q.len())
            .unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
struct MockEntry {
    value: Vec<u8>,
    tags: Vec<String>,
}

/// Mock implementation of TagAwareCache for testing
///
/// 不处理过期；可切换为全部操作失败的模式。
#[derive(Debug, Clone, Default)]
pub struct MockTagAwareCache {
    entries: Arc<Mutex<HashMap<String, MockEntry>>>,
    stats: Arc<Mutex<CacheStats>>,
    failing: Arc<AtomicBool>,
}

impl MockTagAwareCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有操作都返回缓存错误
    pub fn failing() -> Self {
        let cache = Self::new();
        cache.set_failing(true);
        cache
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    fn check(&self) -> TaskHubResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.stats.lock().unwrap().errors += 1;
            return Err(TaskHubError::cache_error("injected cache failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TagAwareCache for MockTagAwareCache {
    async fn get(&self, key: &str) -> TaskHubResult<Option<Vec<u8>>> {
        self.check()?;
        let value = self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.value.clone());
        let mut stats = self.stats.lock().unwrap();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        tags: &[&str],
        _ttl: Duration,
    ) -> TaskHubResult<()> {
        self.check()?;
        self.entries.lock().unwrap().insert(
            key.to_string(),
            MockEntry {
                value: value.to_vec(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
        self.stats.lock().unwrap().sets += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> TaskHubResult<bool> {
        self.check()?;
        self.stats.lock().unwrap().deletes += 1;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn invalidate_tags(&self, tags: &[&str]) -> TaskHubResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| !entry.tags.iter().any(|t| tags.contains(&t.as_str())));
        self.stats.lock().unwrap().invalidations += 1;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Records every mutation it is notified of
#[derive(Debug, Clone, Default)]
pub struct RecordingMutationListener {
    seen: Arc<Mutex<Vec<TaskMutation>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingMutationListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录之后返回错误
    pub fn failing() -> Self {
        let listener = Self::new();
        listener.failing.store(true, Ordering::SeqCst);
        listener
    }

    pub fn mutations(&self) -> Vec<TaskMutation> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskMutationListener for RecordingMutationListener {
    async fn on_mutation(&self, mutation: &TaskMutation) -> TaskHubResult<()> {
        self.seen.lock().unwrap().push(mutation.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(TaskHubError::cache_error("injected listener failure"));
        }
        Ok(())
    }
}
