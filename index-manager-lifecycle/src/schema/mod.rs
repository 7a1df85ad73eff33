//! Schema loader for the index manager.
//!
//! Reads index settings, mappings and seed records from a content source and
//! validates them before anything is sent to the cluster.

mod strict;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde_json::error::Category;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::errors::LifecycleError;
use index_manager_shared::{BulkRecord, IndexSchema};
use strict::StrictValue;

/// Where a document is read from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    /// A file on disk.
    File(PathBuf),
    /// An in-memory blob, labelled for error messages.
    Bytes { label: String, data: Vec<u8> },
    /// A document compiled into the binary.
    Embedded {
        label: &'static str,
        data: &'static str,
    },
}

impl ContentSource {
    /// Create a file source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Create an in-memory source.
    pub fn bytes(label: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            label: label.into(),
            data: data.into(),
        }
    }

    /// Name used in error messages and logs.
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Bytes { label, .. } => label.clone(),
            Self::Embedded { label, .. } => (*label).to_string(),
        }
    }

    fn read(&self) -> Result<Cow<'_, [u8]>, LifecycleError> {
        match self {
            Self::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| LifecycleError::read(self.label(), e.to_string())),
            Self::Bytes { data, .. } => Ok(Cow::Borrowed(data)),
            Self::Embedded { data, .. } => Ok(Cow::Borrowed(data.as_bytes())),
        }
    }

    /// Whether the source holds one JSON document per line.
    fn is_json_lines(&self) -> bool {
        let label = self.label();
        let extension = Path::new(&label)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        matches!(extension.as_deref(), Some("ndjson") | Some("jsonl"))
    }

    /// Parse the source as a single JSON document.
    fn parse(&self) -> Result<Value, LifecycleError> {
        let data = self.read()?;
        serde_json::from_slice::<StrictValue>(&data)
            .map(|StrictValue(value)| value)
            .map_err(|e| self.parse_error(e))
    }

    fn parse_error(&self, error: serde_json::Error) -> LifecycleError {
        match error.classify() {
            // Only duplicate-key detection produces data errors here.
            Category::Data => {
                LifecycleError::validation(format!("{}: {}", self.label(), error))
            }
            _ => LifecycleError::malformed(self.label(), error.to_string()),
        }
    }
}

/// Where the settings and mappings of an index come from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// One document with top-level `settings` and `mappings` keys.
    Combined(ContentSource),
    /// A settings document and a mappings document.
    Split {
        settings: ContentSource,
        mappings: ContentSource,
    },
}

/// Loads and validates index schemas and seed records.
pub struct SchemaLoader;

impl SchemaLoader {
    /// Load the schema for `name` from `source`.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexSchema)` - A validated schema
    /// * `Err(LifecycleError::MalformedDocument)` - If a source is not valid JSON
    /// * `Err(LifecycleError::SchemaValidation)` - If `settings` or `mappings`
    ///   is missing or not an object, the name is empty, a key is duplicated,
    ///   or the mappings declare no fields
    #[instrument(skip(source))]
    pub fn load(name: &str, source: &SchemaSource) -> Result<IndexSchema, LifecycleError> {
        if name.trim().is_empty() {
            return Err(LifecycleError::validation("index name must not be empty"));
        }

        let (settings, mappings) = match source {
            SchemaSource::Combined(content) => {
                let document = content.parse()?;
                let mut document = match document {
                    Value::Object(object) => object,
                    _ => {
                        return Err(LifecycleError::validation(format!(
                            "{}: schema document must be an object",
                            content.label()
                        )))
                    }
                };
                let settings = take_object(&mut document, "settings", content)?;
                let mappings = take_object(&mut document, "mappings", content)?;
                (settings, mappings)
            }
            SchemaSource::Split { settings, mappings } => (
                expect_object(settings.parse()?, "settings", settings)?,
                expect_object(mappings.parse()?, "mappings", mappings)?,
            ),
        };

        let schema = IndexSchema::new(name, &settings, mappings);

        if schema.field_count() == 0 {
            return Err(LifecycleError::validation(format!(
                "mappings for index '{}' declare no fields",
                name
            )));
        }

        debug!(
            settings = schema.settings().len(),
            fields = schema.field_count(),
            "Loaded index schema"
        );

        Ok(schema)
    }

    /// Load seed records from `source`.
    ///
    /// The source is a JSON array of objects, or one object per line when it
    /// is a `.ndjson` / `.jsonl` file. When `id_field` is set, records that
    /// carry that field use its string or integer value as their id.
    #[instrument(skip(source), fields(source = %source.label()))]
    pub fn load_records(
        source: &ContentSource,
        id_field: Option<&str>,
    ) -> Result<Vec<BulkRecord>, LifecycleError> {
        let values = if source.is_json_lines() {
            let data = source.read()?;
            serde_json::Deserializer::from_slice(&data)
                .into_iter::<StrictValue>()
                .map(|item| item.map(|StrictValue(v)| v).map_err(|e| source.parse_error(e)))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            match source.parse()? {
                Value::Array(items) => items,
                _ => {
                    return Err(LifecycleError::validation(format!(
                        "{}: seed data must be a JSON array",
                        source.label()
                    )))
                }
            }
        };

        let records = values
            .into_iter()
            .enumerate()
            .map(|(position, value)| to_record(position, value, id_field, source))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = records.len(), "Loaded seed records");
        Ok(records)
    }
}

fn take_object(
    document: &mut Map<String, Value>,
    key: &str,
    source: &ContentSource,
) -> Result<Map<String, Value>, LifecycleError> {
    match document.remove(key) {
        Some(value) => expect_object(value, key, source),
        None => Err(LifecycleError::validation(format!(
            "{}: missing required key `{}`",
            source.label(),
            key
        ))),
    }
}

fn expect_object(
    value: Value,
    what: &str,
    source: &ContentSource,
) -> Result<Map<String, Value>, LifecycleError> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(LifecycleError::validation(format!(
            "{}: `{}` must be an object",
            source.label(),
            what
        ))),
    }
}

fn to_record(
    position: usize,
    value: Value,
    id_field: Option<&str>,
    source: &ContentSource,
) -> Result<BulkRecord, LifecycleError> {
    let document = match value {
        Value::Object(document) => document,
        _ => {
            return Err(LifecycleError::validation(format!(
                "{}: record #{} is not an object",
                source.label(),
                position
            )))
        }
    };

    let id = match id_field.and_then(|field| document.get(field)) {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        Some(_) => {
            return Err(LifecycleError::validation(format!(
                "{}: record #{} has an id that is not a non-empty string or integer",
                source.label(),
                position
            )))
        }
    };

    Ok(BulkRecord { id, document })
}
