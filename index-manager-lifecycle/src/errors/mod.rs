//! Error types for the index manager lifecycle.

use std::fmt;

use index_manager_repository::IndexClientError;
use thiserror::Error;

/// Remote operation an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Inspect,
    Create,
    Delete,
    Populate,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOperation::Inspect => "inspect",
            RemoteOperation::Create => "create",
            RemoteOperation::Delete => "delete",
            RemoteOperation::Populate => "populate",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while managing an index.
///
/// Messages carry the index name, the operation and the underlying cause.
/// Credentials never reach this type.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A source could not be read at all.
    #[error("Failed to read {source_name}: {reason}")]
    ReadError { source_name: String, reason: String },

    /// A source is not valid JSON.
    #[error("Malformed document {source_name}: {reason}")]
    MalformedDocument { source_name: String, reason: String },

    /// A document parsed but does not describe a usable schema or record set.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Retryable failure that persisted through every attempt.
    #[error("{operation} on index '{index}' failed after {attempts} attempt(s): {source}")]
    RemoteTransient {
        index: String,
        operation: RemoteOperation,
        attempts: u32,
        source: IndexClientError,
    },

    /// The engine refused the request; retrying will not help.
    #[error("{operation} on index '{index}' rejected: {source}")]
    RemoteRejected {
        index: String,
        operation: RemoteOperation,
        source: IndexClientError,
    },

    /// Index creation failed permanently.
    #[error("Failed to create index '{index}': {source}")]
    CreateFailed {
        index: String,
        source: IndexClientError,
    },

    /// Policy-level refusal (destructive change, missing confirmation).
    #[error("{operation} on index '{index}' blocked: {reason}")]
    Blocked {
        index: String,
        operation: RemoteOperation,
        reason: String,
    },

    /// The run was cancelled before the operation completed.
    #[error("{operation} on index '{index}' cancelled")]
    Cancelled {
        index: String,
        operation: RemoteOperation,
    },

    /// Invalid loader or executor configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LifecycleError {
    /// Create a read error.
    pub fn read(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadError {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed document error.
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a schema validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::SchemaValidation(msg.into())
    }

    /// Create a blocked error.
    pub fn blocked(
        index: impl Into<String>,
        operation: RemoteOperation,
        reason: impl Into<String>,
    ) -> Self {
        Self::Blocked {
            index: index.into(),
            operation,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the error was raised before any remote call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::ReadError { .. }
                | Self::MalformedDocument { .. }
                | Self::SchemaValidation(_)
                | Self::ConfigError(_)
        )
    }
}
