//! Dependency initialization and wiring for the index manager.

use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::IndexManagerError;
use index_manager_lifecycle::{Orchestrator, OrchestratorConfig};
use index_manager_repository::{IndexLifecycleClient, OpenSearchIndexClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Build the OpenSearch client, verify the cluster and wire the
    /// orchestrator.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexManagerError)` - If the client cannot be built or the
    ///   cluster is unreachable or unhealthy
    pub async fn new(
        config: &AppConfig,
        orchestrator_config: OrchestratorConfig,
    ) -> Result<Self, IndexManagerError> {
        info!(
            url = %config.connection.url,
            index = %config.index_name,
            authenticated = config.connection.credentials.is_some(),
            timeout_secs = config.connection.request_timeout.as_secs(),
            "Initializing dependencies"
        );

        let client = OpenSearchIndexClient::new(&config.connection)?;
        Self::with_client(Arc::new(client), orchestrator_config).await
    }

    /// Wire the orchestrator around an existing client after checking that
    /// the cluster is healthy.
    pub async fn with_client(
        client: Arc<dyn IndexLifecycleClient>,
        orchestrator_config: OrchestratorConfig,
    ) -> Result<Self, IndexManagerError> {
        if !client.health_check().await? {
            return Err(IndexManagerError::config("Cluster is unhealthy"));
        }

        info!("Cluster connection verified");

        let orchestrator = Orchestrator::with_config(client, orchestrator_config);

        Ok(Self { orchestrator })
    }
}
