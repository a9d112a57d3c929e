//! 标签感知缓存的具体后端
//!
//! 两种后端都用标签代数（generation）实现失效：条目写入时记录各标签当前代数，
//! 读取时任一标签代数已变化即视为未命中。内存后端在失效时还会立即清除条目。

pub mod factory;
pub mod manager;
pub mod redis;

pub use factory::create_cache;
pub use manager::InMemoryTagAwareCache;
pub use redis::RedisTagAwareCache;

use serde::{Deserialize, Serialize};

/// 条目写入时某个标签的代数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStamp {
    pub tag: String,
    pub generation: u64,
}
