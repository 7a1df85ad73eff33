//! Interface definitions for the index lifecycle client.
//!
//! This module defines the abstract `IndexLifecycleClient` trait that allows
//! for dependency injection and swappable search backend implementations.

mod index_lifecycle_client;

pub use index_lifecycle_client::{BulkItemResult, IndexLifecycleClient};
