//! Connection configuration for the OpenSearch client.

use std::fmt;
use std::time::Duration;

/// Default OpenSearch URL.
pub const DEFAULT_URL: &str = "http://localhost:9200";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials presented to the cluster.
///
/// The `Debug` implementation never prints secret material.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// API key authentication (`Authorization: ApiKey base64(id:key)`).
    ApiKey { id: String, key: String },
    /// HTTP basic authentication.
    Basic { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey { id, .. } => f
                .debug_struct("ApiKey")
                .field("id", id)
                .field("key", &"<redacted>")
                .finish(),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl From<Credentials> for opensearch::auth::Credentials {
    fn from(credentials: Credentials) -> Self {
        match credentials {
            Credentials::ApiKey { id, key } => opensearch::auth::Credentials::ApiKey(id, key),
            Credentials::Basic { username, password } => {
                opensearch::auth::Credentials::Basic(username, password)
            }
        }
    }
}

/// Configuration for the OpenSearch client.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Cluster URL (e.g., "http://localhost:9200").
    pub url: String,
    /// Optional credentials. `None` connects anonymously.
    pub credentials: Option<Credentials>,
    /// Timeout applied to every individual request.
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a config for the given URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
