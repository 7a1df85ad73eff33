//! Index planner.
//!
//! Compares the desired schema with what the cluster reports and decides
//! what to do about it. The planner creates missing indexes and never
//! proposes destroying an existing one: a schema mismatch is rejected and
//! left to an explicit, separately confirmed delete.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use index_manager_shared::IndexSchema;

/// Reason attached to a skipped action.
pub const UP_TO_DATE: &str = "already up to date";

/// Reason attached to a rejected action.
pub const INCOMPATIBLE: &str = "incompatible schema; destructive change required";

/// The single action planned for an index in a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// The index does not exist and should be created with this schema.
    Create(IndexSchema),
    /// The index already matches; nothing to do.
    Skip { index: String, reason: String },
    /// The index exists with a different schema; refuse to touch it.
    Reject { index: String, reason: String },
}

impl PlannedAction {
    /// Name of the index the action applies to.
    pub fn index(&self) -> &str {
        match self {
            PlannedAction::Create(schema) => schema.name(),
            PlannedAction::Skip { index, .. } | PlannedAction::Reject { index, .. } => index,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannedAction::Create(_) => "create",
            PlannedAction::Skip { .. } => "skip",
            PlannedAction::Reject { .. } => "reject",
        }
    }
}

/// Key-level differences between a desired and a live schema.
///
/// "Added" means present in the desired schema only; "removed" means present
/// in the live schema only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub settings_added: Vec<String>,
    pub settings_removed: Vec<String>,
    pub settings_changed: Vec<String>,
    pub fields_added: Vec<String>,
    pub fields_removed: Vec<String>,
    pub fields_changed: Vec<String>,
    /// Mapping options outside `properties` (`dynamic`, `_source`, ...).
    pub mapping_options_changed: Vec<String>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.settings_added.is_empty()
            && self.settings_removed.is_empty()
            && self.settings_changed.is_empty()
            && self.fields_added.is_empty()
            && self.fields_removed.is_empty()
            && self.fields_changed.is_empty()
            && self.mapping_options_changed.is_empty()
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("settings added", &self.settings_added),
            ("settings removed", &self.settings_removed),
            ("settings changed", &self.settings_changed),
            ("fields added", &self.fields_added),
            ("fields removed", &self.fields_removed),
            ("fields changed", &self.fields_changed),
            ("mapping options changed", &self.mapping_options_changed),
        ];

        let mut first = true;
        for (label, keys) in sections.iter().filter(|(_, keys)| !keys.is_empty()) {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", label, keys.join(", "))?;
            first = false;
        }

        if first {
            f.write_str("no differences")?;
        }
        Ok(())
    }
}

/// Plans index actions.
pub struct IndexPlanner;

impl IndexPlanner {
    /// Decide what to do with `desired` given the state of the cluster.
    ///
    /// * index absent → `Create(desired)`
    /// * index present with an identical schema → `Skip`
    /// * index present with a different or unreadable schema → `Reject`
    pub fn plan(
        desired: IndexSchema,
        remote_exists: bool,
        remote_schema: Option<&IndexSchema>,
    ) -> PlannedAction {
        let index = desired.name().to_string();

        if !remote_exists {
            debug!(index = %index, "Index absent, planning create");
            return PlannedAction::Create(desired);
        }

        let remote = match remote_schema {
            Some(remote) => remote.without_undeclared_defaults(&desired),
            None => {
                return PlannedAction::Reject {
                    index,
                    reason: format!("{} (live schema unavailable)", INCOMPATIBLE),
                }
            }
        };

        if remote == desired {
            debug!(index = %index, "Index up to date");
            return PlannedAction::Skip {
                index,
                reason: UP_TO_DATE.to_string(),
            };
        }

        let diff = Self::diff(&desired, &remote);
        let reason = if diff.is_empty() {
            format!("{} (live index is named '{}')", INCOMPATIBLE, remote.name())
        } else {
            format!("{} ({})", INCOMPATIBLE, diff)
        };

        debug!(index = %index, diff = %diff, "Index schema differs");
        PlannedAction::Reject { index, reason }
    }

    /// Compute the key-level differences between `desired` and `remote`.
    pub fn diff(desired: &IndexSchema, remote: &IndexSchema) -> SchemaDiff {
        let (settings_added, settings_removed, settings_changed) = compare_maps(
            desired.settings().iter(),
            remote.settings().iter(),
        );

        let empty = Map::new();
        let desired_fields = desired.fields().unwrap_or(&empty);
        let remote_fields = remote.fields().unwrap_or(&empty);
        let (fields_added, fields_removed, fields_changed) =
            compare_maps(desired_fields.iter(), remote_fields.iter());

        let desired_options = desired.mappings().iter().filter(|(k, _)| *k != "properties");
        let remote_options = remote.mappings().iter().filter(|(k, _)| *k != "properties");
        let (mut options_added, options_removed, options_changed) =
            compare_maps(desired_options, remote_options);
        options_added.extend(options_removed);
        options_added.extend(options_changed);
        options_added.sort();

        SchemaDiff {
            settings_added,
            settings_removed,
            settings_changed,
            fields_added,
            fields_removed,
            fields_changed,
            mapping_options_changed: options_added,
        }
    }
}

/// Split the union of keys into (only in desired, only in remote, differing).
fn compare_maps<'a>(
    desired: impl Iterator<Item = (&'a String, &'a Value)>,
    remote: impl Iterator<Item = (&'a String, &'a Value)>,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let desired: BTreeMap<&String, &Value> = desired.collect();
    let remote: BTreeMap<&String, &Value> = remote.collect();
    let keys: BTreeSet<&String> = desired.keys().chain(remote.keys()).copied().collect();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for key in keys {
        match (desired.get(key), remote.get(key)) {
            (Some(_), None) => added.push(key.clone()),
            (None, Some(_)) => removed.push(key.clone()),
            (Some(a), Some(b)) if a != b => changed.push(key.clone()),
            _ => {}
        }
    }

    (added, removed, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn schema(name: &str, settings: Value, mappings: Value) -> IndexSchema {
        IndexSchema::new(
            name,
            settings.as_object().unwrap(),
            mappings.as_object().cloned().unwrap(),
        )
    }

    fn account() -> IndexSchema {
        schema(
            "account",
            json!({ "number_of_shards": 1 }),
            json!({ "properties": { "name": { "type": "text" }, "balance": { "type": "long" } } }),
        )
    }

    #[test]
    fn test_plan_create_when_absent() {
        let action = IndexPlanner::plan(account(), false, None);
        assert_eq!(action, PlannedAction::Create(account()));
        assert_eq!(action.index(), "account");
    }

    #[test]
    fn test_plan_skip_when_identical() {
        let remote = account();
        let action = IndexPlanner::plan(account(), true, Some(&remote));

        assert_eq!(
            action,
            PlannedAction::Skip {
                index: "account".to_string(),
                reason: UP_TO_DATE.to_string()
            }
        );
    }

    #[test]
    fn test_plan_reject_when_different() {
        let remote = schema(
            "account",
            json!({ "number_of_shards": 3 }),
            json!({ "properties": { "name": { "type": "keyword" }, "email": { "type": "keyword" } } }),
        );

        let action = IndexPlanner::plan(account(), true, Some(&remote));

        match action {
            PlannedAction::Reject { index, reason } => {
                assert_eq!(index, "account");
                assert!(reason.starts_with(INCOMPATIBLE));
                assert!(reason.contains("index.number_of_shards"));
                assert!(reason.contains("fields added: balance"));
                assert!(reason.contains("fields removed: email"));
                assert!(reason.contains("fields changed: name"));
            }
            other => panic!("expected reject, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_skip_ignores_undeclared_tier_preference() {
        let remote = schema(
            "account",
            json!({
                "index.number_of_shards": "1",
                "index.routing.allocation.include._tier_preference": "data_content"
            }),
            json!({ "properties": { "name": { "type": "text" }, "balance": { "type": "long" } } }),
        );

        let action = IndexPlanner::plan(account(), true, Some(&remote));

        assert!(matches!(action, PlannedAction::Skip { .. }));
    }

    #[test]
    fn test_plan_reject_when_declared_tier_preference_differs() {
        let mappings =
            json!({ "properties": { "name": { "type": "text" }, "balance": { "type": "long" } } });
        let desired = schema(
            "account",
            json!({
                "number_of_shards": 1,
                "routing.allocation.include._tier_preference": "data_hot"
            }),
            mappings.clone(),
        );
        let remote = schema(
            "account",
            json!({
                "index.number_of_shards": "1",
                "index.routing.allocation.include._tier_preference": "data_content"
            }),
            mappings,
        );

        match IndexPlanner::plan(desired, true, Some(&remote)) {
            PlannedAction::Reject { reason, .. } => {
                assert!(reason.contains("index.routing.allocation.include._tier_preference"));
            }
            other => panic!("expected reject, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_reject_when_remote_schema_unavailable() {
        let action = IndexPlanner::plan(account(), true, None);
        assert!(matches!(action, PlannedAction::Reject { .. }));
    }

    #[test]
    fn test_diff_mapping_options() {
        let desired = schema(
            "a",
            json!({}),
            json!({ "dynamic": "strict", "properties": { "x": { "type": "text" } } }),
        );
        let remote = schema("a", json!({}), json!({ "properties": { "x": { "type": "text" } } }));

        let diff = IndexPlanner::diff(&desired, &remote);

        assert_eq!(diff.mapping_options_changed, vec!["dynamic".to_string()]);
        assert!(diff.fields_changed.is_empty());
        assert_eq!(diff.to_string(), "mapping options changed: dynamic");
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let diff = IndexPlanner::diff(&account(), &account());
        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "no differences");
    }

    fn arb_schema() -> impl Strategy<Value = IndexSchema> {
        (
            "[a-z]{1,8}",
            prop::collection::btree_map("[a-z_]{1,6}", 1u32..8, 0..4),
            prop::collection::btree_map(
                "[a-z]{1,6}",
                prop::sample::select(vec!["text", "keyword", "long", "date"]),
                1..6,
            ),
        )
            .prop_map(|(name, settings, fields)| {
                let settings: Map<String, Value> =
                    settings.into_iter().map(|(k, v)| (k, json!(v))).collect();
                let properties: Map<String, Value> = fields
                    .into_iter()
                    .map(|(k, t)| (k, json!({ "type": t })))
                    .collect();
                let mut mappings = Map::new();
                mappings.insert("properties".to_string(), Value::Object(properties));
                IndexSchema::new(name, &settings, mappings)
            })
    }

    proptest! {
        #[test]
        fn prop_absent_index_is_created(desired in arb_schema()) {
            let action = IndexPlanner::plan(desired.clone(), false, None);
            prop_assert_eq!(action, PlannedAction::Create(desired));
        }

        #[test]
        fn prop_identical_schema_is_skipped(desired in arb_schema()) {
            let remote = desired.clone();
            let action = IndexPlanner::plan(desired, true, Some(&remote));
            prop_assert!(
                matches!(action, PlannedAction::Skip { .. }),
                "expected skip, got {:?}",
                action
            );
        }

        #[test]
        fn prop_different_schema_is_rejected(desired in arb_schema(), remote in arb_schema()) {
            prop_assume!(desired != remote);
            let action = IndexPlanner::plan(desired, true, Some(&remote));
            prop_assert!(
                matches!(action, PlannedAction::Reject { .. }),
                "expected reject, got {:?}",
                action
            );
        }
    }
}
