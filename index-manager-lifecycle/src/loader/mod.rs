//! Bulk loader for the index manager.
//!
//! Splits seed records into batches and submits them with a bounded number
//! of batches in flight. A failing record or batch never stops the others.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancellationSignal;
use crate::errors::LifecycleError;
use crate::retry::{RetryError, RetryPolicy};
use index_manager_repository::{BulkItemResult, IndexClientError, IndexLifecycleClient};
use index_manager_shared::{BulkRecord, RecordKey};

/// Default number of records per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Upper bound on concurrent bulk requests.
pub const MAX_WORKERS: usize = 64;

/// Configuration for the bulk loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of records per bulk request.
    pub batch_size: usize,
    /// Number of bulk requests in flight at once.
    pub workers: usize,
    /// Retry policy applied to each batch as a whole.
    pub retry: RetryPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl LoaderConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check the configuration before any record is submitted.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.batch_size == 0 {
            return Err(LifecycleError::config("batch size must be greater than zero"));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(LifecycleError::config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(LifecycleError::config("max attempts must be greater than zero"));
        }
        Ok(())
    }
}

/// Outcome for one record.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Success,
    Failed(IndexClientError),
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Success)
    }
}

/// A record's key paired with its outcome.
#[derive(Debug, Clone)]
pub struct RecordResult {
    pub key: RecordKey,
    pub outcome: RecordOutcome,
}

/// Aggregate result of a load.
///
/// `outcomes` holds one entry per submitted record, in input order.
/// Records in batches that never started because the run was cancelled are
/// counted in `not_submitted` only; they have no entry and are not part of
/// `total()`.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub outcomes: Vec<RecordResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub not_submitted: usize,
    /// Size of each submitted batch, in batch order.
    pub batch_sizes: Vec<usize>,
    pub cancelled: bool,
}

impl BatchResult {
    /// Number of submitted records.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Keys of every record that failed.
    pub fn failed_keys(&self) -> Vec<&RecordKey> {
        self.outcomes
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| &r.key)
            .collect()
    }

    /// Whether every record was indexed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.not_submitted == 0 && !self.cancelled
    }

    fn record_failed_batch(&mut self, keys: Vec<RecordKey>, error: IndexClientError) {
        self.failed += keys.len();
        self.outcomes.extend(keys.into_iter().map(|key| RecordResult {
            key,
            outcome: RecordOutcome::Failed(error.clone()),
        }));
    }
}

struct Batch {
    number: usize,
    keys: Vec<RecordKey>,
    records: Vec<BulkRecord>,
}

/// Loads seed records into an index.
#[derive(Debug, Clone, Default)]
pub struct BulkLoader {
    config: LoaderConfig,
    cancel: CancellationSignal,
}

impl BulkLoader {
    /// Create a loader with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader with a custom configuration.
    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config,
            cancel: CancellationSignal::new(),
        }
    }

    /// Attach the run's cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Index `records` into `index`.
    ///
    /// Every input record ends up either in `outcomes` or counted as not
    /// submitted. A transient batch failure retries the whole batch; a batch
    /// that still fails marks each of its records failed. Per-record
    /// rejections inside an accepted batch are not retried.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchResult)` - Per-record outcomes, even when some failed
    /// * `Err(LifecycleError::ConfigError)` - If the configuration is invalid
    #[instrument(skip(self, records, client))]
    pub async fn load(
        &self,
        index: &str,
        records: impl IntoIterator<Item = BulkRecord>,
        client: &dyn IndexLifecycleClient,
    ) -> Result<BatchResult, LifecycleError> {
        self.config.validate()?;

        let batches = self.partition(records);
        let batch_count = batches.len();
        info!(
            batches = batch_count,
            batch_size = self.config.batch_size,
            workers = self.config.workers,
            "Loading records"
        );

        let mut responses: Vec<(usize, Result<Vec<BulkItemResult>, RetryError>)> =
            stream::iter(batches.iter())
                .map(|batch| async move {
                    let response = self
                        .config
                        .retry
                        .run(&self.cancel, "bulk_index", || {
                            client.bulk_index(index, &batch.records)
                        })
                        .await;
                    (batch.number, response)
                })
                .buffer_unordered(self.config.workers)
                .collect()
                .await;
        responses.sort_by_key(|(number, _)| *number);

        let mut result = BatchResult::default();
        for (batch, (_, response)) in batches.into_iter().zip(responses) {
            self.collect_batch(&mut result, batch, response);
        }

        if result.cancelled {
            warn!(
                succeeded = result.succeeded,
                failed = result.failed,
                not_submitted = result.not_submitted,
                "Load cancelled"
            );
        } else {
            info!(
                succeeded = result.succeeded,
                failed = result.failed,
                "Load completed"
            );
        }

        Ok(result)
    }

    fn partition(&self, records: impl IntoIterator<Item = BulkRecord>) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();

        for (position, record) in records.into_iter().enumerate() {
            let needs_batch = batches
                .last()
                .map_or(true, |b| b.records.len() == self.config.batch_size);
            if needs_batch {
                batches.push(Batch {
                    number: batches.len(),
                    keys: Vec::with_capacity(self.config.batch_size),
                    records: Vec::with_capacity(self.config.batch_size),
                });
            }

            if let Some(batch) = batches.last_mut() {
                batch.keys.push(record.key(position));
                batch.records.push(record);
            }
        }

        batches
    }

    fn collect_batch(
        &self,
        result: &mut BatchResult,
        batch: Batch,
        response: Result<Vec<BulkItemResult>, RetryError>,
    ) {
        let size = batch.records.len();

        let error = match response {
            Ok(items) if items.len() == size => {
                result.batch_sizes.push(size);
                for (key, item) in batch.keys.into_iter().zip(items) {
                    let outcome = match item {
                        Ok(()) => {
                            result.succeeded += 1;
                            RecordOutcome::Success
                        }
                        Err(error) => {
                            debug!(record = %key, error = %error, "Record rejected");
                            result.failed += 1;
                            RecordOutcome::Failed(error)
                        }
                    };
                    result.outcomes.push(RecordResult { key, outcome });
                }
                return;
            }
            Ok(items) => IndexClientError::parse(format!(
                "bulk response has {} items for {} records",
                items.len(),
                size
            )),
            Err(RetryError::Permanent { error, .. }) => error,
            Err(RetryError::Exhausted { last, .. }) => last,
            Err(RetryError::Cancelled { last: Some(last), .. }) => {
                result.cancelled = true;
                last
            }
            Err(RetryError::Cancelled { last: None, .. }) => {
                result.cancelled = true;
                result.not_submitted += size;
                return;
            }
        };

        warn!(batch = batch.number, records = size, error = %error, "Batch failed");
        result.batch_sizes.push(size);
        result.record_failed_batch(batch.keys, error);
    }
}
