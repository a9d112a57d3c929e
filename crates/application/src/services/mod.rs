pub mod cache_invalidator;
pub mod task_read_model;

pub use cache_invalidator::TaskCacheInvalidator;
pub use task_read_model::{
    TaskReadModel, DEFAULT_LISTING_TTL, TASK_LISTING_KEY, TASK_LISTING_TAG,
};
