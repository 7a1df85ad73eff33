//! Orchestrator for the index manager.
//!
//! Runs the requested actions against one index in a fixed order:
//! delete, then create, then populate. Every document is read and validated
//! before the first remote call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cancel::CancellationSignal;
use crate::errors::LifecycleError;
use crate::executor::{DestroyOutcome, ExecutionResult, LifecycleExecutor};
use crate::loader::{BatchResult, BulkLoader, LoaderConfig};
use crate::planner::{IndexPlanner, PlannedAction};
use crate::retry::RetryPolicy;
use crate::schema::{ContentSource, SchemaLoader, SchemaSource};
use index_manager_repository::IndexLifecycleClient;
use index_manager_shared::{BulkRecord, IndexSchema};

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Retry policy for create, delete and inspect calls.
    pub retry: RetryPolicy,
    /// Bulk loader settings.
    pub loader: LoaderConfig,
}

/// What to do in a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub index: String,
    pub schema: SchemaSource,
    pub data: Option<ContentSource>,
    pub id_field: Option<String>,
    pub delete: bool,
    /// Must equal `index` for the delete to go ahead.
    pub confirm: Option<String>,
    pub create: bool,
    pub populate: bool,
}

impl RunRequest {
    /// A request for `index` with no actions selected.
    pub fn new(index: impl Into<String>, schema: SchemaSource) -> Self {
        Self {
            index: index.into(),
            schema,
            data: None,
            id_field: None,
            delete: false,
            confirm: None,
            create: false,
            populate: false,
        }
    }

    pub fn with_delete(mut self, confirm: Option<String>) -> Self {
        self.delete = true;
        self.confirm = confirm;
        self
    }

    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn with_populate(mut self, data: ContentSource) -> Self {
        self.populate = true;
        self.data = Some(data);
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    /// Whether any action was selected.
    pub fn has_actions(&self) -> bool {
        self.delete || self.create || self.populate
    }
}

/// One of the actions a run can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Delete,
    Create,
    Populate,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Delete => "delete",
            ActionKind::Create => "create",
            ActionKind::Populate => "populate",
        };
        f.write_str(name)
    }
}

/// How an action ended.
#[derive(Debug)]
pub enum ActionStatus {
    Deleted,
    /// Delete found no index.
    NotFound,
    Created,
    UpToDate,
    /// Refused by policy; nothing was changed.
    Blocked(String),
    Loaded(BatchResult),
    Failed(LifecycleError),
    /// The run was cancelled before or during the action.
    Cancelled,
}

impl ActionStatus {
    pub fn is_success(&self) -> bool {
        match self {
            ActionStatus::Deleted
            | ActionStatus::NotFound
            | ActionStatus::Created
            | ActionStatus::UpToDate => true,
            ActionStatus::Loaded(result) => result.is_success(),
            ActionStatus::Blocked(_) | ActionStatus::Failed(_) | ActionStatus::Cancelled => false,
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Deleted => f.write_str("deleted"),
            ActionStatus::NotFound => f.write_str("index not found, nothing deleted"),
            ActionStatus::Created => f.write_str("created"),
            ActionStatus::UpToDate => f.write_str("already up to date"),
            ActionStatus::Blocked(reason) => write!(f, "blocked: {}", reason),
            ActionStatus::Loaded(result) => {
                write!(f, "{} indexed, {} failed", result.succeeded, result.failed)?;
                if result.not_submitted > 0 {
                    write!(f, ", {} not submitted", result.not_submitted)?;
                }
                Ok(())
            }
            ActionStatus::Failed(e) => write!(f, "failed: {}", e),
            ActionStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct ActionReport {
    pub action: ActionKind,
    pub status: ActionStatus,
}

/// Summary of a run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub index: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub actions: Vec<ActionReport>,
}

impl RunReport {
    /// Whether every requested action succeeded.
    pub fn is_success(&self) -> bool {
        self.actions.iter().all(|a| a.status.is_success())
    }

    pub fn status_of(&self, action: ActionKind) -> Option<&ActionStatus> {
        self.actions
            .iter()
            .find(|a| a.action == action)
            .map(|a| &a.status)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Documents read and validated before any remote call.
struct PreparedRun {
    schema: Option<IndexSchema>,
    records: Option<Vec<BulkRecord>>,
}

/// Coordinates the schema loader, planner, executor and bulk loader for a
/// single run against one client.
pub struct Orchestrator {
    client: Arc<dyn IndexLifecycleClient>,
    executor: LifecycleExecutor,
    loader: BulkLoader,
    cancel: CancellationSignal,
}

impl Orchestrator {
    /// Create an orchestrator with the default configuration.
    pub fn new(client: Arc<dyn IndexLifecycleClient>) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    /// Create an orchestrator with a custom configuration.
    pub fn with_config(client: Arc<dyn IndexLifecycleClient>, config: OrchestratorConfig) -> Self {
        let cancel = CancellationSignal::new();

        Self {
            client,
            executor: LifecycleExecutor::with_retry_policy(config.retry)
                .with_cancellation(cancel.clone()),
            loader: BulkLoader::with_config(config.loader).with_cancellation(cancel.clone()),
            cancel,
        }
    }

    /// Signal that cancels this orchestrator's runs when triggered.
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Run the requested actions.
    ///
    /// Local problems (unreadable or invalid documents, bad configuration)
    /// are returned as `Err` before anything is sent to the cluster. Once
    /// remote work starts, each action's outcome is recorded in the report
    /// and later actions still run, except after cancellation.
    #[instrument(skip(self, request), fields(index = %request.index))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, LifecycleError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            delete = request.delete,
            create = request.create,
            populate = request.populate,
            "Starting index manager run"
        );

        let prepared = self.prepare(request)?;
        let mut actions = Vec::new();

        if request.delete {
            let status = self.run_delete(request).await;
            actions.push(ActionReport {
                action: ActionKind::Delete,
                status,
            });
        }

        let mut index_ready = None;
        if let Some(schema) = prepared.schema {
            let status = if self.cancel.is_cancelled() {
                ActionStatus::Cancelled
            } else {
                self.run_create(schema).await
            };
            index_ready = Some(matches!(
                status,
                ActionStatus::Created | ActionStatus::UpToDate
            ));
            actions.push(ActionReport {
                action: ActionKind::Create,
                status,
            });
        }

        if let Some(records) = prepared.records {
            let status = if self.cancel.is_cancelled() {
                ActionStatus::Cancelled
            } else {
                self.run_populate(&request.index, records, index_ready).await
            };
            actions.push(ActionReport {
                action: ActionKind::Populate,
                status,
            });
        }

        let report = RunReport {
            run_id,
            index: request.index.clone(),
            started_at,
            finished_at: Utc::now(),
            actions,
        };

        for action in &report.actions {
            if action.status.is_success() {
                info!(action = %action.action, status = %action.status, "Action finished");
            } else {
                error!(action = %action.action, status = %action.status, "Action did not succeed");
            }
        }
        info!(
            run_id = %report.run_id,
            success = report.is_success(),
            elapsed_ms = report.elapsed_ms(),
            "Run finished"
        );

        Ok(report)
    }

    fn prepare(&self, request: &RunRequest) -> Result<PreparedRun, LifecycleError> {
        if !request.has_actions() {
            return Err(LifecycleError::config(
                "no action requested; choose at least one of create, delete or populate",
            ));
        }
        if request.index.trim().is_empty() {
            return Err(LifecycleError::validation("index name must not be empty"));
        }
        self.loader.config().validate()?;

        let schema = if request.create {
            Some(SchemaLoader::load(&request.index, &request.schema)?)
        } else {
            None
        };

        let records = if request.populate {
            let data = request
                .data
                .as_ref()
                .ok_or_else(|| LifecycleError::config("populate requires a data source"))?;
            Some(SchemaLoader::load_records(data, request.id_field.as_deref())?)
        } else {
            None
        };

        Ok(PreparedRun { schema, records })
    }

    async fn run_delete(&self, request: &RunRequest) -> ActionStatus {
        let confirmation = request.confirm.as_deref().unwrap_or_default();

        match self
            .executor
            .destroy(&request.index, confirmation, self.client.as_ref())
            .await
        {
            Ok(DestroyOutcome::Deleted) => ActionStatus::Deleted,
            Ok(DestroyOutcome::NotFound) => ActionStatus::NotFound,
            Err(e) => status_from_error(e),
        }
    }

    async fn run_create(&self, schema: IndexSchema) -> ActionStatus {
        let client = self.client.as_ref();

        let remote = match self.executor.inspect(schema.name(), client).await {
            Ok(remote) => remote,
            Err(e) => return status_from_error(e),
        };

        let action = IndexPlanner::plan(schema, remote.exists, remote.schema.as_ref());
        info!(action = action.kind(), "Planned");

        match self.executor.apply(&action, client).await {
            Ok(ExecutionResult::Success) => match action {
                PlannedAction::Create(_) => ActionStatus::Created,
                _ => ActionStatus::UpToDate,
            },
            Ok(ExecutionResult::Blocked(reason)) => ActionStatus::Blocked(reason),
            Err(e) => status_from_error(e),
        }
    }

    /// `index_ready` is `None` when create was not requested in this run.
    async fn run_populate(
        &self,
        index: &str,
        records: Vec<BulkRecord>,
        index_ready: Option<bool>,
    ) -> ActionStatus {
        let ready = match index_ready {
            Some(ready) => ready,
            None => match self.executor.inspect(index, self.client.as_ref()).await {
                Ok(remote) => remote.exists,
                Err(e) => return status_from_error(e),
            },
        };

        if !ready {
            let reason = match index_ready {
                Some(_) => "create did not succeed",
                None => "index does not exist",
            };
            warn!(reason, "Skipping populate");
            return ActionStatus::Blocked(reason.to_string());
        }

        match self.loader.load(index, records, self.client.as_ref()).await {
            Ok(result) if result.cancelled => {
                warn!(
                    succeeded = result.succeeded,
                    not_submitted = result.not_submitted,
                    "Populate cancelled"
                );
                ActionStatus::Loaded(result)
            }
            Ok(result) => ActionStatus::Loaded(result),
            Err(e) => status_from_error(e),
        }
    }
}

fn status_from_error(error: LifecycleError) -> ActionStatus {
    match error {
        LifecycleError::Blocked { reason, .. } => ActionStatus::Blocked(reason),
        LifecycleError::Cancelled { .. } => ActionStatus::Cancelled,
        other => ActionStatus::Failed(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_schema, StubClient};
    use serde_json::json;

    fn schema_source() -> SchemaSource {
        let document = json!({
            "settings": { "number_of_shards": 1, "number_of_replicas": 0 },
            "mappings": {
                "properties": {
                    "name": { "type": "text" },
                    "balance": { "type": "long" }
                }
            }
        });
        SchemaSource::Combined(ContentSource::bytes("schema.json", document.to_string()))
    }

    fn data_source(count: usize) -> ContentSource {
        let records: Vec<_> = (0..count)
            .map(|i| json!({ "account_id": i, "name": format!("holder {}", i), "balance": i }))
            .collect();
        ContentSource::bytes("data.json", json!(records).to_string())
    }

    fn full_request() -> RunRequest {
        RunRequest::new("account", schema_source())
            .with_create()
            .with_populate(data_source(5))
            .with_id_field("account_id")
    }

    fn orchestrator(client: &Arc<StubClient>) -> Orchestrator {
        Orchestrator::new(client.clone())
    }

    #[tokio::test]
    async fn test_create_and_populate_empty_cluster() {
        let client = Arc::new(StubClient::new());

        let report = orchestrator(&client).run(&full_request()).await.unwrap();

        assert!(report.is_success());
        assert!(matches!(
            report.status_of(ActionKind::Create),
            Some(ActionStatus::Created)
        ));
        match report.status_of(ActionKind::Populate) {
            Some(ActionStatus::Loaded(result)) => assert_eq!(result.succeeded, 5),
            other => panic!("expected loaded, got {:?}", other),
        }
        assert_eq!(client.indexed_ids("account").len(), 5);
        assert_eq!(client.calls().delete, 0);
    }

    #[tokio::test]
    async fn test_second_create_is_up_to_date() {
        let client = Arc::new(StubClient::new().reporting_tier_preference());
        let orchestrator = orchestrator(&client);
        let request = RunRequest::new("account", schema_source()).with_create();

        orchestrator.run(&request).await.unwrap();
        let report = orchestrator.run(&request).await.unwrap();

        assert!(report.is_success());
        assert!(matches!(
            report.status_of(ActionKind::Create),
            Some(ActionStatus::UpToDate)
        ));
        assert_eq!(client.calls().create, 1);
    }

    #[tokio::test]
    async fn test_invalid_schema_fails_before_remote_calls() {
        let client = Arc::new(StubClient::new());
        let request = RunRequest::new(
            "account",
            SchemaSource::Combined(ContentSource::bytes("schema.json", "{\"settings\": {}")),
        )
        .with_create();

        let err = orchestrator(&client).run(&request).await.unwrap_err();

        assert!(matches!(err, LifecycleError::MalformedDocument { .. }));
        assert_eq!(client.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_no_actions_is_config_error() {
        let client = Arc::new(StubClient::new());
        let request = RunRequest::new("account", schema_source());

        let err = orchestrator(&client).run(&request).await.unwrap_err();

        assert!(matches!(err, LifecycleError::ConfigError(_)));
        assert_eq!(client.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_delete_without_confirmation_is_blocked() {
        let client = Arc::new(StubClient::new().with_index(sample_schema("account")));
        let request = RunRequest::new("account", schema_source())
            .with_delete(None)
            .with_create();

        let report = orchestrator(&client).run(&request).await.unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            report.status_of(ActionKind::Delete),
            Some(ActionStatus::Blocked(_))
        ));
        assert!(matches!(
            report.status_of(ActionKind::Create),
            Some(ActionStatus::UpToDate)
        ));
        assert!(client.has_index("account"));
        assert_eq!(client.calls().delete, 0);
    }

    #[tokio::test]
    async fn test_delete_then_recreate() {
        let client = Arc::new(StubClient::new().with_index(sample_schema("account")));
        let request = full_request().with_delete(Some("account".to_string()));

        let report = orchestrator(&client).run(&request).await.unwrap();

        assert!(report.is_success());
        let order: Vec<ActionKind> = report.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            order,
            vec![ActionKind::Delete, ActionKind::Create, ActionKind::Populate]
        );
        assert!(matches!(
            report.status_of(ActionKind::Delete),
            Some(ActionStatus::Deleted)
        ));
        assert!(matches!(
            report.status_of(ActionKind::Create),
            Some(ActionStatus::Created)
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_index_is_reported() {
        let client = Arc::new(StubClient::new());
        let request =
            RunRequest::new("account", schema_source()).with_delete(Some("account".to_string()));

        let report = orchestrator(&client).run(&request).await.unwrap();

        assert!(report.is_success());
        assert!(matches!(
            report.status_of(ActionKind::Delete),
            Some(ActionStatus::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_mismatch_blocks_create_and_populate() {
        let live = IndexSchema::new(
            "account",
            json!({ "number_of_shards": 3 }).as_object().unwrap(),
            json!({ "properties": { "email": { "type": "keyword" } } })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let client = Arc::new(StubClient::new().with_index(live));

        let report = orchestrator(&client).run(&full_request()).await.unwrap();

        assert!(!report.is_success());
        match report.status_of(ActionKind::Create) {
            Some(ActionStatus::Blocked(reason)) => assert!(reason.contains("fields removed: email")),
            other => panic!("expected blocked, got {:?}", other),
        }
        assert!(matches!(
            report.status_of(ActionKind::Populate),
            Some(ActionStatus::Blocked(_))
        ));
        assert_eq!(client.calls().bulk_index, 0);
        assert_eq!(client.calls().delete, 0);
    }

    #[tokio::test]
    async fn test_populate_requires_existing_index() {
        let client = Arc::new(StubClient::new());
        let request = RunRequest::new("account", schema_source()).with_populate(data_source(2));

        let report = orchestrator(&client).run(&request).await.unwrap();

        match report.status_of(ActionKind::Populate) {
            Some(ActionStatus::Blocked(reason)) => assert_eq!(reason, "index does not exist"),
            other => panic!("expected blocked, got {:?}", other),
        }
        assert_eq!(client.calls().bulk_index, 0);
    }

    #[tokio::test]
    async fn test_populate_existing_index_without_create() {
        let client = Arc::new(StubClient::new().with_index(sample_schema("account")));
        let request = RunRequest::new("account", schema_source()).with_populate(data_source(3));

        let report = orchestrator(&client).run(&request).await.unwrap();

        assert!(report.is_success());
        // No id field configured: engine-assigned ids.
        assert!(client.indexed_ids("account").is_empty());
        assert_eq!(client.calls().bulk_index, 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_makes_no_remote_calls() {
        let client = Arc::new(StubClient::new());
        let orchestrator = orchestrator(&client);
        orchestrator.cancellation().cancel();

        let report = orchestrator.run(&full_request()).await.unwrap();

        assert!(!report.is_success());
        assert!(report
            .actions
            .iter()
            .all(|a| matches!(a.status, ActionStatus::Cancelled)));
        assert_eq!(client.calls().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_cluster_fails_actions() {
        let client = Arc::new(StubClient::new().offline());
        let config = OrchestratorConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                initial_delay_ms: 1,
                max_delay_ms: 1,
            },
            ..Default::default()
        };
        let orchestrator = Orchestrator::with_config(client.clone(), config);

        let report = orchestrator.run(&full_request()).await.unwrap();

        assert!(matches!(
            report.status_of(ActionKind::Create),
            Some(ActionStatus::Failed(LifecycleError::RemoteTransient { attempts: 2, .. }))
        ));
        assert!(matches!(
            report.status_of(ActionKind::Populate),
            Some(ActionStatus::Blocked(_))
        ));
        assert_eq!(client.calls().exists, 2);
    }
}
