//! # Index Manager
//!
//! Main library for the index lifecycle manager.
//!
//! This crate provides the command line, configuration and wiring for
//! running the lifecycle components against an OpenSearch cluster.

pub mod cli;
pub mod config;
pub mod telemetry;

pub use cli::Cli;
pub use config::{AppConfig, Dependencies};

use thiserror::Error;

/// Errors that can occur while starting up.
#[derive(Error, Debug)]
pub enum IndexManagerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Index client error.
    #[error("Index client error: {0}")]
    ClientError(#[from] index_manager_repository::IndexClientError),
}

impl IndexManagerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
