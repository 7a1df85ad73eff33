//! Index lifecycle client trait definition.
//!
//! This module defines the abstract interface for the remote operations the
//! index manager needs, allowing for different backend implementations
//! (OpenSearch, Elasticsearch, test stubs).

use async_trait::async_trait;

use crate::errors::IndexClientError;
use index_manager_shared::{BulkRecord, IndexSchema};

/// Outcome of a single record within a bulk submission.
pub type BulkItemResult = Result<(), IndexClientError>;

/// Abstract interface for index lifecycle operations.
///
/// The index manager depends only on this trait, never on a concrete
/// transport. Implementations own their connection pooling; callers share a
/// single instance behind an `Arc` for the length of a run.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, IndexClientError>`. Callers decide whether
/// to retry using [`IndexClientError::is_transient`].
#[async_trait]
pub trait IndexLifecycleClient: Send + Sync {
    /// Check whether an index with the given name exists.
    async fn exists(&self, name: &str) -> Result<bool, IndexClientError>;

    /// Fetch the live schema of an existing index.
    ///
    /// Settings managed by the engine itself (uuid, creation date, version)
    /// are not part of the returned schema.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexSchema)` - The schema as reported by the engine
    /// * `Err(IndexClientError::NotFound)` - If the index does not exist
    async fn get_schema(&self, name: &str) -> Result<IndexSchema, IndexClientError>;

    /// Create an index with the given schema.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(IndexClientError::Rejected)` - If the engine refused the schema
    ///   or the index already exists
    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), IndexClientError>;

    /// Delete an index and all of its documents.
    async fn delete(&self, name: &str) -> Result<(), IndexClientError>;

    /// Index a single document.
    ///
    /// Documents carrying an id replace any existing document with that id;
    /// documents without one get an engine-assigned id.
    async fn index_document(&self, name: &str, record: &BulkRecord)
        -> Result<(), IndexClientError>;

    /// Index a batch of documents in one round trip where the backend
    /// supports it.
    ///
    /// The outer `Err` is a batch-level failure: nothing in the batch can be
    /// assumed indexed. On `Ok`, the vector holds exactly one outcome per
    /// input record, in input order.
    ///
    /// The default implementation indexes records one at a time.
    async fn bulk_index(
        &self,
        name: &str,
        records: &[BulkRecord],
    ) -> Result<Vec<BulkItemResult>, IndexClientError> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.index_document(name, record).await);
        }
        Ok(results)
    }

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(IndexClientError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, IndexClientError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client that rejects every record whose `name` is "bad".
    struct PerRecordClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IndexLifecycleClient for PerRecordClient {
        async fn exists(&self, _name: &str) -> Result<bool, IndexClientError> {
            Ok(true)
        }

        async fn get_schema(&self, name: &str) -> Result<IndexSchema, IndexClientError> {
            Err(IndexClientError::NotFound(name.to_string()))
        }

        async fn create(&self, _name: &str, _schema: &IndexSchema) -> Result<(), IndexClientError> {
            Ok(())
        }

        async fn delete(&self, _name: &str) -> Result<(), IndexClientError> {
            Ok(())
        }

        async fn index_document(
            &self,
            _name: &str,
            record: &BulkRecord,
        ) -> Result<(), IndexClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if record.document.get("name") == Some(&json!("bad")) {
                return Err(IndexClientError::rejected(400, "mapper_parsing_exception"));
            }
            Ok(())
        }
    }

    fn record(name: &str) -> BulkRecord {
        BulkRecord::new(json!({ "name": name }).as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_default_bulk_index_reports_per_record() {
        let client = PerRecordClient {
            calls: AtomicUsize::new(0),
        };
        let records = vec![record("a"), record("bad"), record("c")];

        let results = client.bulk_index("account", &records).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_default_health_check() {
        let client = PerRecordClient {
            calls: AtomicUsize::new(0),
        };
        assert!(client.health_check().await.unwrap());
    }
}
