//! Aggregate counts and quality figures for a tenant or plan.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::object::{Criticality, InfraObject, ObjectStatus, PlanId, TenantId};
use crate::store::ObjectStore;

/// Counts of objects by lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub detected: usize,
    pub pending_review: usize,
    pub under_review: usize,
    pub approved: usize,
    pub rejected: usize,
    pub modified: usize,
    pub archived: usize,
    pub conflicted: usize,
}

impl StatusCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: ObjectStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: ObjectStatus) -> usize {
        match status {
            ObjectStatus::Detected => self.detected,
            ObjectStatus::PendingReview => self.pending_review,
            ObjectStatus::UnderReview => self.under_review,
            ObjectStatus::Approved => self.approved,
            ObjectStatus::Rejected => self.rejected,
            ObjectStatus::Modified => self.modified,
            ObjectStatus::Archived => self.archived,
            ObjectStatus::Conflicted => self.conflicted,
        }
    }

    /// Objects sitting in a review queue.
    pub fn awaiting_review(&self) -> usize {
        self.pending_review + self.under_review + self.conflicted
    }

    pub fn total(&self) -> usize {
        ObjectStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: ObjectStatus) -> &mut usize {
        match status {
            ObjectStatus::Detected => &mut self.detected,
            ObjectStatus::PendingReview => &mut self.pending_review,
            ObjectStatus::UnderReview => &mut self.under_review,
            ObjectStatus::Approved => &mut self.approved,
            ObjectStatus::Rejected => &mut self.rejected,
            ObjectStatus::Modified => &mut self.modified,
            ObjectStatus::Archived => &mut self.archived,
            ObjectStatus::Conflicted => &mut self.conflicted,
        }
    }
}

/// Counts of objects by criticality level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalityCounts {
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl CriticalityCounts {
    pub fn record(&mut self, criticality: Criticality) {
        match criticality {
            Criticality::None => self.none += 1,
            Criticality::Low => self.low += 1,
            Criticality::Medium => self.medium += 1,
            Criticality::High => self.high += 1,
            Criticality::Critical => self.critical += 1,
        }
    }
}

/// Snapshot statistics over listed objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub tenant_id: TenantId,

    /// Set when the statistics cover a single plan.
    pub plan_id: Option<PlanId>,

    /// Listed objects in scope.
    pub total: usize,

    pub by_status: StatusCounts,

    /// Keyed by free-form category.
    /// Keyed by category name, in name order.
    pub by_category: BTreeMap<String, usize>,

    pub by_criticality: CriticalityCounts,

    pub requires_review: usize,

    pub manually_validated: usize,

    /// Objects with at least one conflict record, resolved or not.
    pub with_conflicts: usize,

    /// Mean confidence over objects that have one; `None` when none do.
    pub average_confidence: Option<f64>,

    /// Mean quality score; objects without confidence count as neutral.
    pub average_quality: Option<f64>,

    /// Pending, under review or conflicted.
    pub review_backlog: usize,

    /// Creation time of the oldest object still awaiting review.
    pub oldest_awaiting_review: Option<DateTime<Utc>>,

    /// Unresolved, non-auto-resolvable duplicate records. A pair is counted
    /// once even though both objects carry it.
    pub blocking_duplicates: usize,

    pub computed_at: DateTime<Utc>,
}

impl Statistics {
    /// Aggregate over `objects`, keeping those that are listed and in scope.
    pub fn from_objects<'a>(
        tenant_id: &TenantId,
        plan_id: Option<&PlanId>,
        objects: impl IntoIterator<Item = &'a InfraObject>,
    ) -> Self {
        let mut stats = Statistics {
            tenant_id: tenant_id.clone(),
            plan_id: plan_id.cloned(),
            total: 0,
            by_status: StatusCounts::new(),
            by_category: BTreeMap::new(),
            by_criticality: CriticalityCounts::default(),
            requires_review: 0,
            manually_validated: 0,
            with_conflicts: 0,
            average_confidence: None,
            average_quality: None,
            review_backlog: 0,
            oldest_awaiting_review: None,
            blocking_duplicates: 0,
            computed_at: Utc::now(),
        };

        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;
        let mut quality_sum = 0.0;
        let mut blocking = BTreeSet::new();

        let in_scope = objects.into_iter().filter(|o| {
            o.is_listed() && &o.tenant_id == tenant_id && plan_id.is_none_or(|p| &o.plan_id == p)
        });

        for object in in_scope {
            stats.total += 1;
            stats.by_status.record(object.status);
            *stats.by_category.entry(object.category.clone()).or_insert(0) += 1;
            stats.by_criticality.record(object.criticality);

            if object.requires_review {
                stats.requires_review += 1;
            }
            if object.manually_validated {
                stats.manually_validated += 1;
            }
            if !object.conflicts.is_empty() {
                stats.with_conflicts += 1;
            }
            if let Some(confidence) = object.confidence {
                confidence_sum += confidence;
                confidence_count += 1;
            }
            quality_sum += object.quality_score();

            if object.status.is_awaiting_review() {
                stats.oldest_awaiting_review = Some(match stats.oldest_awaiting_review {
                    Some(oldest) => oldest.min(object.created_at),
                    None => object.created_at,
                });
            }
            for conflict in object.blocking_conflicts() {
                let (_, a, b) = conflict.key();
                blocking.insert((a.clone(), b.clone()));
            }
        }

        if confidence_count > 0 {
            stats.average_confidence = Some(confidence_sum / confidence_count as f64);
        }
        if stats.total > 0 {
            stats.average_quality = Some(quality_sum / stats.total as f64);
        }
        stats.review_backlog = stats.by_status.awaiting_review();
        stats.blocking_duplicates = blocking.len();
        stats
    }

    /// Share of listed objects that a validator has confirmed.
    pub fn validation_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.manually_validated as f64 / self.total as f64
        }
    }
}

/// Compute statistics from a single store snapshot.
pub fn compute(
    store: &dyn ObjectStore,
    tenant_id: &TenantId,
    plan_id: Option<&PlanId>,
) -> Result<Statistics> {
    let snapshot = store.snapshot()?;
    let stats = Statistics::from_objects(tenant_id, plan_id, &snapshot);
    debug!(tenant = %tenant_id, total = stats.total, "statistics computed");
    Ok(stats)
}
