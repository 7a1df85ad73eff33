//! # Index Manager Shared
//!
//! Types shared by every layer of the index manager: the index schema
//! (settings + mappings) and the seed records loaded into an index.

mod record;
mod schema;

pub use record::{BulkRecord, RecordKey};
pub use schema::{
    canonical_mappings, canonical_settings, IndexSchema, IndexSettings, ENGINE_DEFAULT_SETTINGS,
};
