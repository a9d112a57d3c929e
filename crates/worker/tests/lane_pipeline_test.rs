use std::sync::Arc;
use std::time::Duration;

use taskhub_config::{BrokerConfig, WorkerConfig};
use taskhub_dispatcher::TaskDispatcher;
use taskhub_domain::entities::{Task, TaskStatus};
use taskhub_domain::messaging::{MessageBroker, ProcessingMessage};
use taskhub_domain::repositories::TaskStore;
use taskhub_domain::value_objects::Lane;
use taskhub_infrastructure::{InMemoryMessageQueue, InMemoryTaskStore};
use taskhub_worker::{LaneWorkerPool, TaskProcessor};

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        workers_per_lane: 2,
        poll_timeout_ms: 20,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatched_tasks_are_all_processed() {
    let store = Arc::new(InMemoryTaskStore::new());
    for i in 0..30 {
        store.create(Task::new(format!("Task {i}"), Some(i % 3 + 1))).await.unwrap();
    }
    let queue = Arc::new(InMemoryMessageQueue::new());

    let dispatcher = TaskDispatcher::new(store.clone(), queue.clone());
    assert_eq!(dispatcher.dispatch_all().await.unwrap().dispatched, 30);

    let pool = LaneWorkerPool::new(
        queue.clone(),
        Arc::new(TaskProcessor::new(store.clone())),
        worker_config(),
    );
    pool.start().await.unwrap();
    assert!(pool.wait_until_drained(Duration::from_secs(5)).await.unwrap());
    pool.stop().await;

    let tasks = store.find_all_ordered_by_created_at_desc().await.unwrap();
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Processed));
    assert!(tasks.iter().all(|t| t.processed_at.is_some()));
    assert_eq!(pool.stats().await.acked, 30);
}

#[tokio::test]
async fn test_duplicate_delivery_keeps_first_processed_at() {
    let store = Arc::new(InMemoryTaskStore::new());
    let task = store.create(Task::new("dup", Some(3))).await.unwrap();
    let queue = Arc::new(InMemoryMessageQueue::new());

    let pool = LaneWorkerPool::new(
        queue.clone(),
        Arc::new(TaskProcessor::new(store.clone())),
        worker_config(),
    );
    pool.start().await.unwrap();

    queue.publish(Lane::High, &ProcessingMessage::new(task.id)).await.unwrap();
    assert!(pool.wait_until_drained(Duration::from_secs(2)).await.unwrap());
    let first = store.find(task.id).await.unwrap().unwrap().processed_at;

    queue.publish(Lane::High, &ProcessingMessage::new(task.id)).await.unwrap();
    assert!(pool.wait_until_drained(Duration::from_secs(2)).await.unwrap());
    pool.stop().await;

    let after = store.find(task.id).await.unwrap().unwrap();
    assert_eq!(after.processed_at, first);
    assert!(first.is_some());
}

#[tokio::test]
async fn test_message_for_deleted_task_is_acked() {
    let store = Arc::new(InMemoryTaskStore::new());
    let task = store.create(Task::new("gone", Some(1))).await.unwrap();
    let queue = Arc::new(InMemoryMessageQueue::new());
    queue.publish(Lane::Low, &ProcessingMessage::new(task.id)).await.unwrap();
    store.delete(task.id).await.unwrap();

    let pool = LaneWorkerPool::new(
        queue.clone(),
        Arc::new(TaskProcessor::new(store.clone())),
        worker_config(),
    );
    pool.start().await.unwrap();
    assert!(pool.wait_until_drained(Duration::from_secs(2)).await.unwrap());
    pool.stop().await;

    let stats = queue.stats().await;
    assert_eq!(stats.lane(Lane::Low).unwrap().acked, 1);
    assert_eq!(stats.total_dead_lettered(), 0);
}

#[tokio::test]
async fn test_pool_stops_promptly_when_idle() {
    let queue = Arc::new(InMemoryMessageQueue::with_config(BrokerConfig::default()));
    let store = Arc::new(InMemoryTaskStore::new());
    let pool = LaneWorkerPool::new(
        queue,
        Arc::new(TaskProcessor::new(store)),
        WorkerConfig {
            workers_per_lane: 3,
            poll_timeout_ms: 60_000,
        },
    );
    pool.start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), pool.stop())
        .await
        .expect("pool did not stop");
}
