//! In-memory index client used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::cancel::CancellationSignal;
use index_manager_repository::{BulkItemResult, IndexClientError, IndexLifecycleClient};
use index_manager_shared::{BulkRecord, IndexSchema};

pub(crate) fn sample_schema(name: &str) -> IndexSchema {
    IndexSchema::new(
        name,
        json!({ "number_of_shards": 1, "number_of_replicas": 0 })
            .as_object()
            .unwrap(),
        json!({
            "properties": {
                "name": { "type": "text" },
                "balance": { "type": "long" }
            }
        })
        .as_object()
        .cloned()
        .unwrap(),
    )
}

pub(crate) fn sample_records(count: usize) -> Vec<BulkRecord> {
    (0..count)
        .map(|i| {
            let document = json!({ "name": format!("holder {}", i), "balance": i });
            BulkRecord::new(document.as_object().cloned().unwrap()).with_id(i.to_string())
        })
        .collect()
}

/// Snapshot of how often each client method was called.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallCounts {
    pub exists: usize,
    pub get_schema: usize,
    pub create: usize,
    pub delete: usize,
    pub bulk_index: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.exists + self.get_schema + self.create + self.delete + self.bulk_index
    }
}

type DelayFn = Box<dyn Fn(&[BulkRecord]) -> Duration + Send + Sync>;

/// Index client backed by a map of index name to schema.
///
/// Creating an existing index is rejected the way the engine rejects it and
/// deleting a missing one reports `NotFound`.
#[derive(Default)]
pub(crate) struct StubClient {
    indexes: Mutex<HashMap<String, IndexSchema>>,
    documents: Mutex<HashMap<String, Vec<BulkRecord>>>,
    create_failures: Mutex<Option<(u32, IndexClientError)>>,
    lose_first_create_response: bool,
    report_tier_preference: bool,
    bulk_failures: Mutex<Option<(u32, IndexClientError)>>,
    rejected_ids: HashSet<String>,
    bulk_delay: Option<DelayFn>,
    cancel_after_bulk: Option<(usize, CancellationSignal)>,
    offline: bool,
    exists_calls: AtomicUsize,
    get_schema_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(self, schema: IndexSchema) -> Self {
        self.indexes
            .lock()
            .unwrap()
            .insert(schema.name().to_string(), schema);
        self
    }

    /// Fail the next `times` create calls with `error`.
    pub fn failing_create(self, times: u32, error: IndexClientError) -> Self {
        *self.create_failures.lock().unwrap() = Some((times, error));
        self
    }

    /// The first create takes effect but the caller sees a timeout.
    pub fn create_lands_then_times_out(mut self) -> Self {
        self.lose_first_create_response = true;
        self
    }

    /// Report schemas with the data tier preference the engine fills in.
    pub fn reporting_tier_preference(mut self) -> Self {
        self.report_tier_preference = true;
        self
    }

    /// Fail the next `times` bulk calls with `error`.
    pub fn failing_bulk(self, times: u32, error: IndexClientError) -> Self {
        *self.bulk_failures.lock().unwrap() = Some((times, error));
        self
    }

    /// Reject the records with these ids inside an otherwise accepted batch.
    pub fn rejecting_ids<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.rejected_ids = ids.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_bulk_delay(
        mut self,
        delay: impl Fn(&[BulkRecord]) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.bulk_delay = Some(Box::new(delay));
        self
    }

    /// Trigger `signal` once `calls` bulk calls have completed.
    pub fn cancel_after_bulk(mut self, calls: usize, signal: CancellationSignal) -> Self {
        self.cancel_after_bulk = Some((calls, signal));
        self
    }

    /// Every call fails with a connection error.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            exists: self.exists_calls.load(Ordering::SeqCst),
            get_schema: self.get_schema_calls.load(Ordering::SeqCst),
            create: self.create_calls.load(Ordering::SeqCst),
            delete: self.delete_calls.load(Ordering::SeqCst),
            bulk_index: self.bulk_calls.load(Ordering::SeqCst),
        }
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.lock().unwrap().contains_key(name)
    }

    pub fn indexed_ids(&self, name: &str) -> Vec<String> {
        self.documents
            .lock()
            .unwrap()
            .get(name)
            .map(|docs| docs.iter().filter_map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<(), IndexClientError> {
        if self.offline {
            return Err(IndexClientError::connection("connection refused"));
        }
        Ok(())
    }

    fn take_failure(slot: &Mutex<Option<(u32, IndexClientError)>>) -> Option<IndexClientError> {
        let mut slot = slot.lock().unwrap();
        match slot.as_mut() {
            Some((remaining, error)) if *remaining > 0 => {
                *remaining -= 1;
                Some(error.clone())
            }
            _ => None,
        }
    }
}

#[async_trait]
impl IndexLifecycleClient for StubClient {
    async fn exists(&self, name: &str) -> Result<bool, IndexClientError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.has_index(name))
    }

    async fn get_schema(&self, name: &str) -> Result<IndexSchema, IndexClientError> {
        self.get_schema_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let schema = self
            .indexes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IndexClientError::NotFound(name.to_string()))?;

        if !self.report_tier_preference {
            return Ok(schema);
        }
        let mut settings = schema.settings().clone();
        settings.insert(
            "index.routing.allocation.include._tier_preference".to_string(),
            json!("data_content"),
        );
        Ok(IndexSchema::from_flat(name, settings, schema.mappings().clone()))
    }

    async fn create(&self, name: &str, schema: &IndexSchema) -> Result<(), IndexClientError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if let Some(error) = Self::take_failure(&self.create_failures) {
            return Err(error);
        }

        let mut indexes = self.indexes.lock().unwrap();
        if indexes.contains_key(name) {
            return Err(IndexClientError::rejected(
                400,
                format!("resource_already_exists_exception: index [{}] already exists", name),
            ));
        }
        indexes.insert(name.to_string(), schema.clone());

        if self.lose_first_create_response && call == 0 {
            return Err(IndexClientError::timeout("request timed out"));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), IndexClientError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.documents.lock().unwrap().remove(name);
        match self.indexes.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(IndexClientError::NotFound(name.to_string())),
        }
    }

    async fn index_document(
        &self,
        name: &str,
        record: &BulkRecord,
    ) -> Result<(), IndexClientError> {
        let mut results = self.bulk_index(name, std::slice::from_ref(record)).await?;
        results.pop().unwrap_or(Ok(()))
    }

    async fn bulk_index(
        &self,
        name: &str,
        records: &[BulkRecord],
    ) -> Result<Vec<BulkItemResult>, IndexClientError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = &self.bulk_delay {
            tokio::time::sleep(delay(records)).await;
        }

        let result = self.apply_bulk(name, records);

        if let Some((after, signal)) = &self.cancel_after_bulk {
            if self.bulk_calls.load(Ordering::SeqCst) >= *after {
                signal.cancel();
            }
        }
        result
    }
}

impl StubClient {
    fn apply_bulk(
        &self,
        name: &str,
        records: &[BulkRecord],
    ) -> Result<Vec<BulkItemResult>, IndexClientError> {
        self.check_online()?;
        if let Some(error) = Self::take_failure(&self.bulk_failures) {
            return Err(error);
        }
        if !self.has_index(name) {
            return Err(IndexClientError::NotFound(name.to_string()));
        }

        let mut documents = self.documents.lock().unwrap();
        let stored = documents.entry(name.to_string()).or_default();
        Ok(records
            .iter()
            .map(|record| match &record.id {
                Some(id) if self.rejected_ids.contains(id) => Err(IndexClientError::rejected(
                    400,
                    format!("mapper_parsing_exception: failed to parse document {}", id),
                )),
                _ => {
                    stored.push(record.clone());
                    Ok(())
                }
            })
            .collect())
    }
}

