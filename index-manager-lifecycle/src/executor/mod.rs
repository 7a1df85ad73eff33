//! Lifecycle executor.
//!
//! Applies planned actions against the cluster. The executor holds no state
//! between calls beyond its retry policy and the run's cancellation signal.

use tracing::{info, instrument, warn};

use crate::cancel::CancellationSignal;
use crate::errors::{LifecycleError, RemoteOperation};
use crate::planner::PlannedAction;
use crate::retry::{RetryError, RetryPolicy};
use index_manager_repository::{IndexClientError, IndexLifecycleClient};
use index_manager_shared::IndexSchema;

/// Result of applying a planned action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The action completed (the index was created or was already current).
    Success,
    /// The action was refused by policy; nothing was sent to the cluster.
    Blocked(String),
}

/// Result of a confirmed destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Deleted,
    /// There was nothing to delete.
    NotFound,
}

/// What the cluster currently holds for an index.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub exists: bool,
    pub schema: Option<IndexSchema>,
}

/// Executes planned actions through an [`IndexLifecycleClient`].
#[derive(Debug, Clone, Default)]
pub struct LifecycleExecutor {
    retry: RetryPolicy,
    cancel: CancellationSignal,
}

impl LifecycleExecutor {
    /// Create an executor with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with a custom retry policy.
    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            retry,
            cancel: CancellationSignal::new(),
        }
    }

    /// Attach the run's cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read the live state of `name`, retrying transient failures.
    #[instrument(skip(self, client))]
    pub async fn inspect(
        &self,
        name: &str,
        client: &dyn IndexLifecycleClient,
    ) -> Result<RemoteState, LifecycleError> {
        let exists = self
            .retry
            .run(&self.cancel, "exists", || client.exists(name))
            .await
            .map_err(|e| remote_error(name, RemoteOperation::Inspect, e))?;

        if !exists {
            return Ok(RemoteState {
                exists,
                schema: None,
            });
        }

        let schema = match self
            .retry
            .run(&self.cancel, "get_schema", || client.get_schema(name))
            .await
        {
            Ok(schema) => Some(schema),
            // Deleted between the two calls.
            Err(RetryError::Permanent {
                error: IndexClientError::NotFound(_),
                ..
            }) => {
                return Ok(RemoteState {
                    exists: false,
                    schema: None,
                })
            }
            Err(e) => return Err(remote_error(name, RemoteOperation::Inspect, e)),
        };

        Ok(RemoteState { exists, schema })
    }

    /// Apply a planned action.
    ///
    /// Only `Create` reaches the cluster. `Skip` succeeds and `Reject` is
    /// blocked without any remote call. Nothing here ever deletes an index.
    ///
    /// # Returns
    ///
    /// * `Ok(ExecutionResult::Success)` - Created or already up to date
    /// * `Ok(ExecutionResult::Blocked)` - The plan refused the change
    /// * `Err(LifecycleError::CreateFailed)` - The cluster rejected the create
    /// * `Err(LifecycleError::RemoteTransient)` - Every attempt failed transiently
    #[instrument(
        skip(self, action, client),
        fields(index = %action.index(), action = action.kind())
    )]
    pub async fn apply(
        &self,
        action: &PlannedAction,
        client: &dyn IndexLifecycleClient,
    ) -> Result<ExecutionResult, LifecycleError> {
        match action {
            PlannedAction::Skip { reason, .. } => {
                info!(reason = %reason, "Nothing to do");
                Ok(ExecutionResult::Success)
            }
            PlannedAction::Reject { reason, .. } => {
                warn!(reason = %reason, "Refusing to modify index");
                Ok(ExecutionResult::Blocked(reason.clone()))
            }
            PlannedAction::Create(schema) => self.create(schema, client).await,
        }
    }

    async fn create(
        &self,
        schema: &IndexSchema,
        client: &dyn IndexLifecycleClient,
    ) -> Result<ExecutionResult, LifecycleError> {
        let name = schema.name();
        info!(fields = schema.field_count(), "Creating index");

        match self
            .retry
            .run(&self.cancel, "create", || client.create(name, schema))
            .await
        {
            Ok(()) => {
                info!("Index created");
                Ok(ExecutionResult::Success)
            }
            // An earlier attempt may have landed even though its response was
            // lost. If the live index matches, the create did its job.
            Err(RetryError::Permanent {
                attempts,
                error: error @ IndexClientError::Rejected { .. },
            }) if attempts > 1 => match client.get_schema(name).await {
                Ok(live) if live.without_undeclared_defaults(schema) == *schema => {
                    info!(attempts, "Index created by an earlier attempt");
                    Ok(ExecutionResult::Success)
                }
                _ => Err(LifecycleError::CreateFailed {
                    index: name.to_string(),
                    source: error,
                }),
            },
            Err(RetryError::Permanent { error, .. }) => Err(LifecycleError::CreateFailed {
                index: name.to_string(),
                source: error,
            }),
            Err(e) => Err(remote_error(name, RemoteOperation::Create, e)),
        }
    }

    /// Delete `name` and everything in it.
    ///
    /// `confirmation` must equal the index name; anything else is refused
    /// before any remote call. Deleting an index that does not exist reports
    /// `DestroyOutcome::NotFound`.
    #[instrument(skip(self, confirmation, client))]
    pub async fn destroy(
        &self,
        name: &str,
        confirmation: &str,
        client: &dyn IndexLifecycleClient,
    ) -> Result<DestroyOutcome, LifecycleError> {
        if name.is_empty() || confirmation != name {
            return Err(LifecycleError::blocked(
                name,
                RemoteOperation::Delete,
                "confirmation token must equal the index name",
            ));
        }

        let exists = self
            .retry
            .run(&self.cancel, "exists", || client.exists(name))
            .await
            .map_err(|e| remote_error(name, RemoteOperation::Delete, e))?;

        if !exists {
            info!("Index does not exist, nothing to delete");
            return Ok(DestroyOutcome::NotFound);
        }

        warn!("Deleting index");
        match self
            .retry
            .run(&self.cancel, "delete", || client.delete(name))
            .await
        {
            Ok(()) => {
                info!("Index deleted");
                Ok(DestroyOutcome::Deleted)
            }
            Err(RetryError::Permanent {
                error: IndexClientError::NotFound(_),
                ..
            }) => Ok(DestroyOutcome::NotFound),
            Err(e) => Err(remote_error(name, RemoteOperation::Delete, e)),
        }
    }
}

/// Attach index and operation context to a retry failure.
pub(crate) fn remote_error(
    index: &str,
    operation: RemoteOperation,
    error: RetryError,
) -> LifecycleError {
    let index = index.to_string();
    match error {
        RetryError::Permanent { error, .. } => LifecycleError::RemoteRejected {
            index,
            operation,
            source: error,
        },
        RetryError::Exhausted { attempts, last } => LifecycleError::RemoteTransient {
            index,
            operation,
            attempts,
            source: last,
        },
        RetryError::Cancelled { .. } => LifecycleError::Cancelled { index, operation },
    }
}
