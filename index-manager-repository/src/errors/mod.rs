//! Error types for the index manager repository.

mod index_client_error;

pub use index_client_error::IndexClientError;
