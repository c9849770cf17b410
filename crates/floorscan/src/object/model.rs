//! The infra object record and its enumerations.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::{Conflict, ConflictType};
use crate::geometry::Geometry;

use super::history::HistoryEntry;
use super::ids::{ObjectId, PlanId, TenantId};
use super::properties::ObjectProperties;

/// Quality score given to objects without a confidence value.
pub const NEUTRAL_QUALITY_SCORE: f64 = 50.0;

/// Review status of an infra object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Freshly detected or created, not yet queued for review.
    Detected,
    /// Queued for a validator.
    PendingReview,
    /// A validator has picked it up.
    UnderReview,
    /// Validated by a human.
    Approved,
    /// Dismissed by a human.
    Rejected,
    /// Edited after detection.
    Modified,
    /// A scan attached a new conflict.
    Conflicted,
    /// Retired from the plan.
    Archived,
}

impl ObjectStatus {
    pub const ALL: [ObjectStatus; 8] = [
        ObjectStatus::Detected,
        ObjectStatus::PendingReview,
        ObjectStatus::UnderReview,
        ObjectStatus::Approved,
        ObjectStatus::Rejected,
        ObjectStatus::Modified,
        ObjectStatus::Conflicted,
        ObjectStatus::Archived,
    ];

    /// Get the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectStatus::Detected => "detected",
            ObjectStatus::PendingReview => "pending_review",
            ObjectStatus::UnderReview => "under_review",
            ObjectStatus::Approved => "approved",
            ObjectStatus::Rejected => "rejected",
            ObjectStatus::Modified => "modified",
            ObjectStatus::Conflicted => "conflicted",
            ObjectStatus::Archived => "archived",
        }
    }

    /// Rejected and archived objects accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ObjectStatus::Rejected | ObjectStatus::Archived)
    }

    /// Statuses that sit in a validator's queue.
    pub fn is_awaiting_review(&self) -> bool {
        matches!(
            self,
            ObjectStatus::PendingReview | ObjectStatus::UnderReview | ObjectStatus::Conflicted
        )
    }

    /// Statuses the retention sweeper may soft-delete.
    pub fn is_retainable(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown status: {}", s))
    }
}

/// Safety relevance of an object.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::None => "none",
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        }
    }

    /// High and critical objects need a human sign-off.
    pub fn needs_validation(&self) -> bool {
        matches!(self, Criticality::High | Criticality::Critical)
    }
}

impl std::str::FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Criticality::None),
            "low" => Ok(Criticality::Low),
            "medium" => Ok(Criticality::Medium),
            "high" => Ok(Criticality::High),
            "critical" => Ok(Criticality::Critical),
            _ => Err(format!("Unknown criticality: {}", s)),
        }
    }
}

/// Where an object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectSource {
    AiDetection,
    ManualCreation,
    Imported,
    Template,
    Duplicated,
}

impl ObjectSource {
    /// Duplicating an existing object is an edit-on-create path.
    pub fn initial_status(&self) -> ObjectStatus {
        match self {
            ObjectSource::Duplicated => ObjectStatus::Modified,
            _ => ObjectStatus::Detected,
        }
    }
}

/// A user comment attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Result of checking an object against a compliance rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub rule: String,
    pub passed: bool,
    pub checked_at: DateTime<Utc>,
    pub checked_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A facility item located on a floor plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraObject {
    pub id: ObjectId,
    pub tenant_id: TenantId,
    pub plan_id: PlanId,

    /// AI pipeline job that produced this object, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub category: String,

    #[serde(rename = "type")]
    pub object_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// Missing only on imported records that never had a placement.
    #[serde(default)]
    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: ObjectProperties,

    /// Detection probability in `[0, 1]`.
    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub criticality: Criticality,

    pub status: ObjectStatus,
    pub source: ObjectSource,
    pub requires_review: bool,
    pub manually_validated: bool,

    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub validated_by: Option<String>,

    #[serde(default)]
    pub parent_object_id: Option<ObjectId>,

    #[serde(default)]
    pub related_object_ids: BTreeSet<ObjectId>,

    #[serde(default)]
    pub conflicts: Vec<Conflict>,

    #[serde(default)]
    pub annotations: Vec<Annotation>,

    #[serde(default)]
    pub modification_history: Vec<HistoryEntry>,

    #[serde(default)]
    pub compliance_checks: Vec<ComplianceCheck>,

    pub created_by: String,
    pub last_modified_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_deleted: bool,

    /// Bumped on every committed write.
    #[serde(default)]
    pub revision: u64,
}

impl InfraObject {
    /// Visible to default queries, scans and statistics.
    pub fn is_listed(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    /// `confidence * 100`, or the neutral score when no confidence is known.
    pub fn quality_score(&self) -> f64 {
        self.confidence
            .map(|c| c * 100.0)
            .unwrap_or(NEUTRAL_QUALITY_SCORE)
    }

    /// Duplicate conflicts that must be resolved before approval.
    pub fn blocking_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| {
            c.conflict_type == ConflictType::Duplicate && !c.auto_resolvable && !c.resolved
        })
    }

    /// Check that the confidence value, if any, is a probability.
    pub fn validate_confidence(&self) -> Result<(), String> {
        match self.confidence {
            Some(c) if !c.is_finite() || !(0.0..=1.0).contains(&c) => {
                Err(format!("confidence {} is outside [0, 1]", c))
            }
            _ => Ok(()),
        }
    }

    /// Case-insensitive match of `needle` against name and description.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [self.name.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in ObjectStatus::ALL {
            let parsed: ObjectStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ObjectStatus::Rejected.is_terminal());
        assert!(ObjectStatus::Archived.is_terminal());
        assert!(!ObjectStatus::Approved.is_terminal());
        assert!(!ObjectStatus::Conflicted.is_terminal());
    }

    #[test]
    fn test_criticality_order_and_validation() {
        assert!(Criticality::Critical > Criticality::High);
        assert!(Criticality::High.needs_validation());
        assert!(!Criticality::Medium.needs_validation());
        assert_eq!("HIGH".parse::<Criticality>().unwrap(), Criticality::High);
    }

    #[test]
    fn test_duplicated_source_starts_modified() {
        assert_eq!(ObjectSource::Duplicated.initial_status(), ObjectStatus::Modified);
        assert_eq!(ObjectSource::AiDetection.initial_status(), ObjectStatus::Detected);
        assert_eq!(ObjectSource::ManualCreation.initial_status(), ObjectStatus::Detected);
    }
}
