//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use index_manager_lifecycle::loader::DEFAULT_BATCH_SIZE;
use index_manager_lifecycle::{
    ContentSource, LoaderConfig, OrchestratorConfig, RetryPolicy, RunRequest, SchemaSource,
};

/// Default settings document.
pub const DEFAULT_SETTINGS_FILE: &str = "index_settings.json";

/// Default mappings document.
pub const DEFAULT_MAPPINGS_FILE: &str = "index_mappings.json";

/// Default seed data document.
pub const DEFAULT_DATA_FILE: &str = "index_data.json";

#[derive(Parser, Debug)]
#[command(name = "index-manager")]
#[command(about = "Create, delete and populate a search index", long_about = None)]
pub struct Cli {
    /// Delete the index (requires --confirm with the index name)
    #[arg(long)]
    pub delete: bool,

    /// Index name repeated to confirm a delete
    #[arg(long, value_name = "INDEX")]
    pub confirm: Option<String>,

    /// Create the index if it does not exist
    #[arg(long)]
    pub create: bool,

    /// Load seed records into the index
    #[arg(long)]
    pub populate: bool,

    /// Index name (overrides INDEX_NAME)
    #[arg(long)]
    pub index: Option<String>,

    /// Single document holding both settings and mappings
    #[arg(long, conflicts_with_all = ["settings", "mappings"])]
    pub schema: Option<PathBuf>,

    /// Index settings document [default: index_settings.json]
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Index mappings document [default: index_mappings.json]
    #[arg(long)]
    pub mappings: Option<PathBuf>,

    /// Seed records, a JSON array or .ndjson/.jsonl file
    #[arg(long, default_value = DEFAULT_DATA_FILE)]
    pub data: PathBuf,

    /// Records per bulk request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Bulk requests in flight at once
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Attempts per remote call, including the first
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Record field whose value becomes the document id
    #[arg(long)]
    pub id_field: Option<String>,

    /// Cluster URL (overrides OPENSEARCH_URL)
    #[arg(long)]
    pub url: Option<String>,
}

impl Cli {
    /// Whether any action flag was given.
    pub fn has_actions(&self) -> bool {
        self.delete || self.create || self.populate
    }

    /// Apply flag overrides on top of environment settings.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.connection.url = url.clone();
        }
        if let Some(index) = &self.index {
            config.index_name = index.clone();
        }
    }

    pub fn schema_source(&self) -> SchemaSource {
        match &self.schema {
            Some(path) => SchemaSource::Combined(ContentSource::file(path)),
            None => SchemaSource::Split {
                settings: ContentSource::file(
                    self.settings
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE)),
                ),
                mappings: ContentSource::file(
                    self.mappings
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPINGS_FILE)),
                ),
            },
        }
    }

    /// Build the run request for `index`.
    pub fn run_request(&self, index: &str) -> RunRequest {
        let mut request = RunRequest::new(index, self.schema_source());
        if self.delete {
            request = request.with_delete(self.confirm.clone());
        }
        if self.create {
            request = request.with_create();
        }
        if self.populate {
            request = request.with_populate(ContentSource::file(&self.data));
        }
        if let Some(id_field) = &self.id_field {
            request = request.with_id_field(id_field.clone());
        }
        request
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let retry = RetryPolicy::with_max_attempts(self.max_attempts);

        OrchestratorConfig {
            retry: retry.clone(),
            loader: LoaderConfig::default()
                .with_batch_size(self.batch_size)
                .with_workers(self.workers)
                .with_retry_policy(retry),
        }
    }
}
