//! Index client error types.
//!
//! This module defines the error types that can occur while talking to the
//! search engine, and classifies them as transient or permanent.

use thiserror::Error;

/// Errors that can occur during index lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum IndexClientError {
    /// Failed to reach the search engine (connection refused, DNS, TLS).
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The engine reported an overload or internal failure (429 or 5xx).
    #[error("Server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The engine refused the request (validation failure, conflict).
    #[error("Request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The index does not exist.
    #[error("Index not found: {0}")]
    NotFound(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The client could not be configured.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IndexClientError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a rejection error.
    pub fn rejected(status: u16, msg: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: msg.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// 408, 429 and 5xx are transient; 404 is `NotFound`; every other status
    /// is a permanent rejection.
    pub fn from_status(status: u16, msg: impl Into<String>) -> Self {
        let message = msg.into();
        match status {
            404 => Self::NotFound(message),
            408 => Self::Timeout(message),
            429 | 500..=599 => Self::ServerError { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) | Self::ServerError { .. } => true,
            Self::Rejected { .. }
            | Self::NotFound(_)
            | Self::ParseError(_)
            | Self::ConfigError(_) => false,
        }
    }
}
