//! # Index Manager Repository
//!
//! This crate provides the client capability the index manager depends on
//! for every remote call, along with a concrete implementation for
//! OpenSearch. It includes definitions for errors, the client interface, and
//! connection configuration.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;

pub use config::{ConnectionConfig, Credentials};
pub use errors::IndexClientError;
pub use interfaces::{BulkItemResult, IndexLifecycleClient};
pub use opensearch::OpenSearchIndexClient;
