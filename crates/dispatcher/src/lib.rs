//! 任务分发
//!
//! 根据任务优先级选择通道，并向消息代理发布处理消息。

pub mod dispatcher;
pub mod report;

pub use dispatcher::*;
pub use report::*;
