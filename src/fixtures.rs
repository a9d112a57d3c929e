use taskhub_domain::entities::Task;
use taskhub_domain::repositories::TaskStore;
use taskhub_errors::TaskHubResult;
use tracing::info;

/// 第 `i` 个演示任务（从 1 开始）
pub fn demo_task(i: usize) -> Task {
    let mut task = Task::new(format!("Task {i}"), Some((i % 3 + 1) as i64));
    if i % 4 != 0 {
        task.assigned_to = Some(format!("User{}", i % 4));
    }
    if i % 2 == 1 {
        task.description = Some(format!("Demo task number {i}"));
    }
    task.retry_count = (i % 3) as i32;
    task
}

/// 写入 `count` 个待处理的演示任务，返回写入数量
pub async fn seed(store: &dyn TaskStore, count: usize) -> TaskHubResult<usize> {
    for i in 1..=count {
        store.create(demo_task(i)).await?;
    }
    info!("已写入演示任务: {}", count);
    Ok(count)
}
