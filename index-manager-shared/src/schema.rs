//! Index schema types.
//!
//! An [`IndexSchema`] couples an index name with its settings and mappings.
//! Settings are kept in the engine's flat form (`index.number_of_shards`
//! style keys with string values) so a schema loaded from disk and a schema
//! reported by a live cluster compare key-by-key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flattened index settings keyed by their fully qualified dotted name.
pub type IndexSettings = BTreeMap<String, Value>;

const INDEX_PREFIX: &str = "index.";

/// Settings the engine fills in on creation when the request leaves them
/// out. A reported value only counts when the desired schema declares it.
pub const ENGINE_DEFAULT_SETTINGS: &[&str] =
    &["index.routing.allocation.include._tier_preference"];

/// Schema of a single named index.
///
/// Settings and mappings are fixed once the schema is built; there are no
/// mutating accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    name: String,
    settings: IndexSettings,
    mappings: Map<String, Value>,
}

impl IndexSchema {
    /// Build a schema from a (possibly nested) settings document and a
    /// mappings document.
    pub fn new(
        name: impl Into<String>,
        settings: &Map<String, Value>,
        mappings: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            settings: canonical_settings(settings),
            mappings: canonical_mappings(mappings),
        }
    }

    /// Build a schema from settings that are already in flat form.
    pub fn from_flat(
        name: impl Into<String>,
        settings: IndexSettings,
        mappings: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            mappings: canonical_mappings(mappings),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn mappings(&self) -> &Map<String, Value> {
        &self.mappings
    }

    /// Field declarations under `mappings.properties`.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.mappings.get("properties").and_then(Value::as_object)
    }

    /// Number of top-level fields declared by the mappings.
    pub fn field_count(&self) -> usize {
        self.fields().map_or(0, Map::len)
    }

    /// Copy of this schema without engine defaults that `declared` does not
    /// set itself.
    pub fn without_undeclared_defaults(&self, declared: &IndexSchema) -> IndexSchema {
        let settings = self
            .settings
            .iter()
            .filter(|(key, _)| {
                !ENGINE_DEFAULT_SETTINGS.contains(&key.as_str())
                    || declared.settings.contains_key(*key)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            name: self.name.clone(),
            settings,
            mappings: self.mappings.clone(),
        }
    }

    /// Request body for an index creation call.
    pub fn to_create_body(&self) -> Value {
        let settings: Map<String, Value> = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut body = Map::new();
        body.insert("settings".to_string(), Value::Object(settings));
        body.insert("mappings".to_string(), Value::Object(self.mappings.clone()));
        Value::Object(body)
    }
}

/// Flatten a settings document into the engine's `flat_settings` shape.
///
/// Nested objects are joined with `.`, every key gains the `index.` prefix
/// when it lacks one, scalars become strings and arrays become arrays of
/// strings. `null` leaves are dropped.
pub fn canonical_settings(settings: &Map<String, Value>) -> IndexSettings {
    let mut flat = IndexSettings::new();
    flatten_into(&mut flat, "", settings);

    flat.into_iter()
        .map(|(key, value)| {
            if key.starts_with(INDEX_PREFIX) {
                (key, value)
            } else {
                (format!("{}{}", INDEX_PREFIX, key), value)
            }
        })
        .collect()
}

/// Normalize mapping options the engine reports back in a different form.
///
/// `dynamic` may be declared as a boolean but is echoed as a string; every
/// `dynamic` flag, at the root or on object fields, is kept as a string.
pub fn canonical_mappings(mut mappings: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in mappings.iter_mut() {
        match value {
            Value::Bool(flag) if key == "dynamic" => {
                let flag = *flag;
                *value = Value::String(flag.to_string());
            }
            Value::Object(inner) => {
                *inner = canonical_mappings(std::mem::take(inner));
            }
            _ => {}
        }
    }
    mappings
}

fn flatten_into(out: &mut IndexSettings, prefix: &str, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(inner) => flatten_into(out, &path, inner),
            Value::Null => {}
            Value::Array(items) => {
                let items = items
                    .iter()
                    .filter_map(scalar_string)
                    .map(Value::String)
                    .collect();
                out.insert(path, Value::Array(items));
            }
            other => {
                if let Some(s) = scalar_string(other) {
                    out.insert(path, Value::String(s));
                }
            }
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        // Nested structures inside arrays are kept verbatim.
        other => Some(other.to_string()),
    }
}
