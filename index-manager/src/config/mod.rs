//! Configuration and dependency wiring for the index manager.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{AppConfig, DEFAULT_INDEX_NAME};
