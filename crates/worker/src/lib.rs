pub mod pool;
pub mod processor;

pub use pool::{LaneWorkerPool, WorkerStats};
pub use processor::{ProcessOutcome, TaskProcessor};
