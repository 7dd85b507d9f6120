//! Managed vector index integration.

pub mod client;
pub mod retry;
pub mod types;

pub use client::IndexService;
pub use retry::{is_transient, with_retry};
pub use types::{IndexError, ScoredMatch, VectorRecord};
