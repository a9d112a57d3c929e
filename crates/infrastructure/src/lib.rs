pub mod cache;
pub mod in_memory_queue;
pub mod in_memory_store;

pub use cache::*;
pub use in_memory_queue::*;
pub use in_memory_store::*;
