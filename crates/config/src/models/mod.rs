pub mod app_config;
pub mod cache;
pub mod fixtures;
pub mod logging;
pub mod message_queue;
pub mod worker;

pub use app_config::*;
pub use cache::*;
pub use fixtures::*;
pub use logging::*;
pub use message_queue::*;
pub use worker::*;
