use std::sync::Arc;

use chrono::{Duration, Utc};
use taskhub_application::{TaskCacheInvalidator, TaskReadModel};
use taskhub_domain::entities::{canonical_timestamp, ListingSource, Task};
use taskhub_domain::repositories::TaskStore;
use taskhub_infrastructure::{InMemoryTagAwareCache, InMemoryTaskStore};
use taskhub_testing_utils::TaskBuilder;

async fn wired() -> (Arc<InMemoryTaskStore>, TaskReadModel) {
    let store = Arc::new(InMemoryTaskStore::new());
    let cache = Arc::new(InMemoryTagAwareCache::new());
    store
        .subscribe(Arc::new(TaskCacheInvalidator::new(cache.clone())))
        .await;
    let model = TaskReadModel::new(store.clone(), cache);
    (store, model)
}

#[tokio::test]
async fn test_any_mutation_between_reads_forces_recompute() {
    let (store, model) = wired().await;
    let task = store.create(Task::new("first", Some(2))).await.unwrap();

    assert_eq!(model.list_with_source().await.unwrap().source, ListingSource::Recomputed);
    assert_eq!(model.list_with_source().await.unwrap().source, ListingSource::Cache);

    // create
    store.create(Task::new("second", Some(1))).await.unwrap();
    let listing = model.list_with_source().await.unwrap();
    assert_eq!(listing.source, ListingSource::Recomputed);
    assert_eq!(listing.items.len(), 2);
    assert_eq!(model.list_with_source().await.unwrap().source, ListingSource::Cache);

    // update
    let mut updated = store.find(task.id).await.unwrap().unwrap();
    updated.mark_processed(Utc::now());
    store.save(&updated).await.unwrap();
    let listing = model.list_with_source().await.unwrap();
    assert_eq!(listing.source, ListingSource::Recomputed);
    assert!(listing.items.iter().any(|i| i.id == task.id && i.done));

    // delete
    store.delete(task.id).await.unwrap();
    let listing = model.list_with_source().await.unwrap();
    assert_eq!(listing.source, ListingSource::Recomputed);
    assert_eq!(listing.items.len(), 1);
}

#[tokio::test]
async fn test_listing_items_mirror_store_rows() {
    let (store, model) = wired().await;
    let now = Utc::now();
    store
        .create(
            TaskBuilder::new()
                .with_name("described")
                .with_description("details")
                .with_priority(3)
                .assigned_to("User1")
                .with_retry_count(2)
                .created_at(now - Duration::minutes(1))
                .build(),
        )
        .await
        .unwrap();
    store
        .create(
            TaskBuilder::new()
                .with_name("done")
                .without_priority()
                .created_at(now)
                .processed_at(now)
                .build(),
        )
        .await
        .unwrap();

    let listing = model.list_with_source().await.unwrap();
    let tasks = store.find_all_ordered_by_created_at_desc().await.unwrap();
    assert_eq!(listing.items.len(), tasks.len());

    for (item, task) in listing.items.iter().zip(tasks.iter()) {
        assert_eq!(item.id, task.id);
        assert_eq!(item.name, task.name);
        assert_eq!(item.description, task.description);
        assert_eq!(item.status, task.status.as_str());
        assert_eq!(item.priority, task.priority);
        assert_eq!(item.assigned_to, task.assigned_to);
        assert_eq!(item.created_at, canonical_timestamp(&task.created_at));
        assert_eq!(
            item.processed_at,
            task.processed_at.as_ref().map(canonical_timestamp)
        );
        assert_eq!(item.retry_count, task.retry_count);
        assert_eq!(item.done, task.is_processed());
    }
    assert_eq!(listing.items[0].name, "done");
}

#[tokio::test]
async fn test_invalidate_all_without_mutation() {
    let (store, model) = wired().await;
    store.create(Task::new("only", Some(2))).await.unwrap();
    model.list_with_source().await.unwrap();

    model.invalidate_all().await.unwrap();
    // 缓存为空时再次失效不报错
    model.invalidate_all().await.unwrap();

    assert_eq!(model.list_with_source().await.unwrap().source, ListingSource::Recomputed);
}
