//! Settings read from the environment.

use std::env;
use std::time::Duration;

use crate::telemetry::LogFormat;
use crate::IndexManagerError;
use index_manager_repository::config::DEFAULT_URL;
use index_manager_repository::{ConnectionConfig, Credentials};

/// Default index name.
pub const DEFAULT_INDEX_NAME: &str = "account";

/// Default per-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub index_name: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::new(DEFAULT_URL),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: Cluster URL, falling back to `ELASTICSEARCH_HOST`
    ///   (default: http://localhost:9200)
    /// - `OPENSEARCH_API_KEY_ID` / `OPENSEARCH_API_KEY`: API key credentials,
    ///   falling back to `ELASTICSEARCH_API_KEY_ID` / `ELASTICSEARCH_API_KEY`
    /// - `OPENSEARCH_USERNAME` / `OPENSEARCH_PASSWORD`: Basic credentials,
    ///   used when no API key is set
    /// - `INDEX_NAME`: Index to manage (default: account)
    /// - `REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    /// - `LOG_FORMAT`: `json` for JSON log lines
    pub fn from_env() -> Result<Self, IndexManagerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexManagerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|key| get(*key));

        let url = first(&["OPENSEARCH_URL", "ELASTICSEARCH_HOST"])
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                IndexManagerError::config(format!(
                    "REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    value
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(IndexManagerError::config(
                "REQUEST_TIMEOUT_SECS must be greater than zero",
            ));
        }

        let api_key_id = first(&["OPENSEARCH_API_KEY_ID", "ELASTICSEARCH_API_KEY_ID"]);
        let api_key = first(&["OPENSEARCH_API_KEY", "ELASTICSEARCH_API_KEY"]);
        let credentials = match (api_key_id, api_key) {
            (Some(id), Some(key)) => Some(Credentials::ApiKey { id, key }),
            (Some(_), None) | (None, Some(_)) => {
                return Err(IndexManagerError::config(
                    "API key authentication needs both a key id and a key",
                ))
            }
            (None, None) => match (get("OPENSEARCH_USERNAME"), get("OPENSEARCH_PASSWORD")) {
                (Some(username), Some(password)) => Some(Credentials::Basic { username, password }),
                (Some(_), None) => {
                    return Err(IndexManagerError::config(
                        "OPENSEARCH_USERNAME is set but OPENSEARCH_PASSWORD is not",
                    ))
                }
                _ => None,
            },
        };

        let mut connection = ConnectionConfig::new(url)
            .with_request_timeout(Duration::from_secs(timeout_secs));
        connection.credentials = credentials;

        Ok(Self {
            connection,
            index_name: get("INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            log_format: get("LOG_FORMAT")
                .map(|value| LogFormat::parse(&value))
                .unwrap_or_default(),
        })
    }
}
