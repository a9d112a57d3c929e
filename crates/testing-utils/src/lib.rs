//! # TaskHub Testing Utils
//!
//! Shared test doubles for the taskhub workspace: in-memory implementations of the
//! store, broker and cache traits with call recording and failure injection,
//! plus builders for test data.
//!
//! ```toml
//! [dev-dependencies]
//! taskhub-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
