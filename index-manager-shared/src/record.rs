//! Seed records loaded into an index.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single document to be indexed, with an optional caller-supplied id.
///
/// Records without an id are indexed under an engine-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRecord {
    /// Document id to index under, if the caller supplied one.
    pub id: Option<String>,
    /// The document body.
    pub document: Map<String, Value>,
}

impl BulkRecord {
    /// Create a record without an id.
    pub fn new(document: Map<String, Value>) -> Self {
        Self { id: None, document }
    }

    /// Set the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Key used to report this record's outcome.
    ///
    /// Falls back to the record's position in the input sequence when no id
    /// was supplied.
    pub fn key(&self, position: usize) -> RecordKey {
        match &self.id {
            Some(id) => RecordKey::Id(id.clone()),
            None => RecordKey::Position(position),
        }
    }
}

/// Identifies a record in a load report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    /// The caller-supplied document id.
    Id(String),
    /// Zero-based position in the input sequence.
    Position(usize),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{}", id),
            RecordKey::Position(pos) => write!(f, "#{}", pos),
        }
    }
}
