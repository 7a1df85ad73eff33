//! OpenSearch implementation of the index lifecycle client.
//!
//! This module provides a concrete implementation of `IndexLifecycleClient`
//! using OpenSearch as the backend. The same wire protocol is spoken by
//! Elasticsearch clusters.

mod client;
mod responses;

pub use client::OpenSearchIndexClient;
