//! Change detection between a stored snapshot and a fresh extraction.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{ChangeSet, FieldChange, SubjectRecord};

/// Fields whose changes are reported. Everything else on the record is
/// stored but not diffed.
pub const TRACKED_FIELDS: &[&str] = &[
    "banner",
    "name",
    "occupation",
    "education",
    "vial_options",
    "compliance_flags",
    "document_id",
    "profile_as_of",
];

fn as_object(record: &SubjectRecord) -> serde_json::Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// Compare the tracked fields of two snapshots by serialized value.
///
/// Without a previous snapshot the result is `ChangeSet::Initial`; comparing a
/// record with itself yields an empty field map.
pub fn diff(previous: Option<&SubjectRecord>, current: &SubjectRecord) -> ChangeSet {
    let Some(previous) = previous else {
        return ChangeSet::Initial;
    };

    let old = as_object(previous);
    let new = as_object(current);
    let mut changes = BTreeMap::new();
    for field in TRACKED_FIELDS {
        let before = old.get(*field).cloned().unwrap_or(Value::Null);
        let after = new.get(*field).cloned().unwrap_or(Value::Null);
        if before != after {
            changes.insert(
                field.to_string(),
                FieldChange {
                    old: before,
                    new: after,
                },
            );
        }
    }
    ChangeSet::Fields(changes)
}
