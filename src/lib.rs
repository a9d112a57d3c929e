pub mod app;
pub mod common;
pub mod fixtures;
pub mod shutdown;

pub use app::{AppMode, Application, DemoSummary};
pub use shutdown::ShutdownManager;
