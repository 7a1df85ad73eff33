//! # Index Manager Lifecycle
//!
//! This crate provides the components that take an index from a schema on
//! disk to a populated index on the cluster.
//!
//! ## Architecture
//!
//! A run follows the Loader-Planner-Executor pattern:
//!
//! 1. **SchemaLoader**: Reads and validates settings, mappings and seed data
//! 2. **IndexPlanner**: Compares the desired schema with the live index
//! 3. **LifecycleExecutor**: Applies the plan, with retries and a guarded delete
//! 4. **BulkLoader**: Indexes seed records in bounded batches
//! 5. **Orchestrator**: Coordinates a run and reports per-action status

pub mod cancel;
pub mod errors;
pub mod executor;
pub mod loader;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod schema;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationSignal;
pub use errors::{LifecycleError, RemoteOperation};
pub use executor::{DestroyOutcome, ExecutionResult, LifecycleExecutor, RemoteState};
pub use loader::{BatchResult, BulkLoader, LoaderConfig, RecordOutcome, RecordResult};
pub use orchestrator::{
    ActionKind, ActionReport, ActionStatus, Orchestrator, OrchestratorConfig, RunReport,
    RunRequest,
};
pub use planner::{IndexPlanner, PlannedAction, SchemaDiff};
pub use retry::RetryPolicy;
pub use schema::{ContentSource, SchemaLoader, SchemaSource};
