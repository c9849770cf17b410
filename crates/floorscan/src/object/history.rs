//! Append-only modification history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::model::InfraObject;

/// Bookkeeping fields that change on every write and are not diffed.
const UNTRACKED_FIELDS: [&str; 4] = [
    "modificationHistory",
    "updatedAt",
    "lastModifiedBy",
    "revision",
];

/// One field that changed in a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// Short verb describing the write (e.g. "approve", "scan").
    pub action: String,
    pub changes: Vec<FieldChange>,
}

impl HistoryEntry {
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        changes: Vec<FieldChange>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            action: action.into(),
            changes,
        }
    }

    /// Whether a field with this name appears in the diff.
    pub fn touches(&self, field: &str) -> bool {
        self.changes.iter().any(|c| c.field == field)
    }
}

/// Field-level diff between two versions of the same object.
///
/// Fields are compared by their serialized (camelCase) names. Fields missing
/// on one side are reported with `null`.
pub fn diff(before: &InfraObject, after: &InfraObject) -> Result<Vec<FieldChange>> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;

    let empty = serde_json::Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let mut fields: Vec<&String> = before.keys().chain(after.keys()).collect();
    fields.sort();
    fields.dedup();

    let changes = fields
        .into_iter()
        .filter(|field| !UNTRACKED_FIELDS.contains(&field.as_str()))
        .filter_map(|field| {
            let old = before.get(field).cloned().unwrap_or(Value::Null);
            let new = after.get(field).cloned().unwrap_or(Value::Null);
            (old != new).then(|| FieldChange {
                field: field.clone(),
                before: old,
                after: new,
            })
        })
        .collect();

    Ok(changes)
}
