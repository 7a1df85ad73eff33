//! OpenSearch response parsing.
//!
//! Pure functions that turn raw response bodies into index manager types, so
//! they can be tested without a live cluster.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::IndexClientError;
use crate::interfaces::BulkItemResult;
use index_manager_shared::IndexSchema;

/// Settings the engine adds to every index on its own. They never appear in
/// a desired schema and are dropped from reported ones.
const MANAGED_SETTINGS: &[&str] = &[
    "index.uuid",
    "index.creation_date",
    "index.provided_name",
    "index.history.uuid",
    "index.replication.type",
    "index.version.",
];

/// Longest raw error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

#[derive(Debug, Deserialize)]
struct BulkResponseItem {
    #[serde(alias = "create")]
    index: BulkItemStatus,
}

#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    status: u16,
    #[serde(default)]
    error: Option<EngineError>,
}

#[derive(Debug, Deserialize)]
struct EngineError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    reason: String,
}

impl EngineError {
    fn describe(&self) -> String {
        match (self.kind.is_empty(), self.reason.is_empty()) {
            (false, false) => format!("{}: {}", self.kind, self.reason),
            (false, true) => self.kind.clone(),
            (true, _) => self.reason.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: EngineErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EngineErrorField {
    Structured(EngineError),
    Plain(String),
}

fn is_managed(key: &str) -> bool {
    MANAGED_SETTINGS.iter().any(|managed| {
        if managed.ends_with('.') {
            key.starts_with(managed)
        } else {
            key == *managed
        }
    })
}

/// Parse a `GET /{index}?flat_settings=true` response into a schema.
///
/// The response is keyed by concrete index name; when `name` is an alias the
/// single entry present is used instead.
pub(crate) fn parse_index_schema(
    name: &str,
    body: &Value,
) -> Result<IndexSchema, IndexClientError> {
    let indices = body
        .as_object()
        .ok_or_else(|| IndexClientError::parse("index response is not an object"))?;

    let entry = indices
        .get(name)
        .or_else(|| indices.values().next())
        .ok_or_else(|| IndexClientError::NotFound(name.to_string()))?;

    let settings: Map<String, Value> = entry
        .get("settings")
        .and_then(Value::as_object)
        .map(|settings| {
            settings
                .iter()
                .filter(|(key, _)| !is_managed(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let mappings = entry
        .get("mappings")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(IndexSchema::new(name, &settings, mappings))
}

/// Parse a `_bulk` response into one outcome per submitted record.
pub(crate) fn parse_bulk_response(
    body: Value,
    expected: usize,
) -> Result<Vec<BulkItemResult>, IndexClientError> {
    let response: BulkResponse = serde_json::from_value(body)
        .map_err(|e| IndexClientError::parse(format!("Invalid bulk response: {}", e)))?;

    if response.items.len() != expected {
        return Err(IndexClientError::parse(format!(
            "Bulk response has {} items, expected {}",
            response.items.len(),
            expected
        )));
    }

    if !response.errors {
        return Ok(vec![Ok(()); expected]);
    }

    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let status = item.index.status;
            match item.index.error {
                None if (200..300).contains(&status) => Ok(()),
                None => Err(IndexClientError::from_status(status, "bulk item failed")),
                Some(error) => Err(IndexClientError::from_status(status, error.describe())),
            }
        })
        .collect())
}

/// Extract a readable message from an error response body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: EngineErrorField::Structured(error),
        }) => error.describe(),
        Ok(ErrorBody {
            error: EngineErrorField::Plain(message),
        }) => message,
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}
