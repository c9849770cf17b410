//! Conflict records embedded on infra objects.

use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// Kind of geometric relationship between two objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Same category and type with nearly identical centers.
    Duplicate,
    /// Bounding boxes touch within tolerance.
    Overlap,
}

impl ConflictType {
    pub fn label(&self) -> &'static str {
        match self {
            ConflictType::Duplicate => "Duplicate",
            ConflictType::Overlap => "Overlap",
        }
    }
}

/// How urgently a conflict should be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
}

/// A conflict between two objects. `object1_id < object2_id` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub object1_id: ObjectId,
    pub object2_id: ObjectId,
    pub description: String,
    pub severity: ConflictSeverity,

    /// Review-priority hint: the pair is likely a low-confidence duplicate.
    /// Nothing is merged or deleted automatically.
    pub auto_resolvable: bool,

    /// Set by a validator through `resolve_conflict`.
    #[serde(default)]
    pub resolved: bool,
}

impl Conflict {
    /// Build a record, ordering the pair so that the smaller id comes first.
    pub fn new(
        conflict_type: ConflictType,
        a: &ObjectId,
        b: &ObjectId,
        description: impl Into<String>,
        severity: ConflictSeverity,
        auto_resolvable: bool,
    ) -> Self {
        let (object1_id, object2_id) = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        Self {
            conflict_type,
            object1_id,
            object2_id,
            description: description.into(),
            severity,
            auto_resolvable,
            resolved: false,
        }
    }

    /// Identity of a conflict across scans.
    pub fn key(&self) -> (ConflictType, &ObjectId, &ObjectId) {
        (self.conflict_type, &self.object1_id, &self.object2_id)
    }

    pub fn involves(&self, id: &ObjectId) -> bool {
        &self.object1_id == id || &self.object2_id == id
    }

    /// The id on the other side of the pair.
    pub fn other(&self, id: &ObjectId) -> Option<&ObjectId> {
        if &self.object1_id == id {
            Some(&self.object2_id)
        } else if &self.object2_id == id {
            Some(&self.object1_id)
        } else {
            None
        }
    }
}
