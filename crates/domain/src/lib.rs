pub mod cache;
pub mod entities;
pub mod events;
pub mod messaging;
pub mod repositories;
pub mod value_objects;

pub use cache::*;
pub use entities::*;
pub use events::*;
pub use messaging::*;
pub use repositories::*;
pub use taskhub_errors::{TaskHubError, TaskHubResult};
pub use value_objects::*;
