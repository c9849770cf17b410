//! Pairwise duplicate/overlap scanner.

use std::cell::Cell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FloorscanError, Result};
use crate::object::{InfraObject, ObjectId, PlanId, TenantId};
use crate::review::{ReviewPolicy, Transition};
use crate::store::{Audit, ObjectStore};

use super::record::{Conflict, ConflictSeverity, ConflictType};

/// Default pixel slack for center and box comparisons.
pub const DEFAULT_TOLERANCE_PX: f64 = 5.0;

/// Duplicates where either side is below this confidence are flagged
/// auto-resolvable.
pub const DEFAULT_AUTO_RESOLVE_CONFIDENCE: f64 = 0.8;

/// Actor recorded on history entries written by scans.
pub const SCAN_ACTOR: &str = "system:conflict-detector";

/// Tuning for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub tolerance_px: f64,
    pub auto_resolve_confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tolerance_px: DEFAULT_TOLERANCE_PX,
            auto_resolve_confidence: DEFAULT_AUTO_RESOLVE_CONFIDENCE,
        }
    }
}

/// A pair skipped because one side had unusable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityWarning {
    pub object1_id: ObjectId,
    pub object2_id: ObjectId,
    /// The object whose data was malformed.
    pub offending_id: ObjectId,
    pub message: String,
}

/// Conflicts found among a set of objects, before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    /// Sorted by pair, duplicates before overlaps.
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<IntegrityWarning>,
    pub pairs_compared: usize,
}

/// Outcome of scanning one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub tenant_id: TenantId,
    pub plan_id: PlanId,
    pub objects_scanned: usize,
    pub pairs_compared: usize,
    pub conflicts: Vec<Conflict>,
    pub integrity_warnings: Vec<IntegrityWarning>,
    /// Objects whose stored conflicts, status or review flag changed.
    pub objects_updated: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn count(&self, conflict_type: ConflictType) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.conflict_type == conflict_type)
            .count()
    }
}

/// Finds duplicates and overlaps between active objects of a plan.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: DetectorConfig,
}

impl ConflictDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Compare every unordered pair of listed objects.
    ///
    /// Unlisted objects are ignored. A pair where either object has missing
    /// or malformed geometry or confidence is skipped and reported.
    pub fn detect(&self, objects: &[InfraObject]) -> Findings {
        let mut listed: Vec<&InfraObject> = objects.iter().filter(|o| o.is_listed()).collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));

        let problems: Vec<Option<String>> = listed.iter().map(|o| integrity_problem(o)).collect();
        for (obj, problem) in listed.iter().zip(&problems) {
            if let Some(message) = problem {
                let err = FloorscanError::DataIntegrity {
                    object_id: obj.id.to_string(),
                    message: message.clone(),
                };
                warn!(
                    plan = %obj.plan_id,
                    error = %err,
                    "skipping object pairs during conflict scan"
                );
            }
        }

        let tolerance = self.config.tolerance_px;
        let mut findings = Findings::default();
        let mut duplicates = Vec::new();
        let mut overlaps = Vec::new();

        for i in 0..listed.len() {
            for j in (i + 1)..listed.len() {
                let (a, b) = (listed[i], listed[j]);
                findings.pairs_compared += 1;

                let problem = problems[i]
                    .as_ref()
                    .map(|m| (&a.id, m))
                    .or_else(|| problems[j].as_ref().map(|m| (&b.id, m)));
                if let Some((offending, message)) = problem {
                    findings.warnings.push(IntegrityWarning {
                        object1_id: a.id.clone(),
                        object2_id: b.id.clone(),
                        offending_id: offending.clone(),
                        message: message.clone(),
                    });
                    continue;
                }

                // Checked above: both geometries are present and valid.
                let (Some(ga), Some(gb)) = (a.geometry.as_ref(), b.geometry.as_ref()) else {
                    continue;
                };

                if a.category == b.category && a.object_type == b.object_type {
                    let distance = ga.center_distance(gb);
                    if distance.within(tolerance) {
                        let lowest = a.confidence.unwrap_or(0.0).min(b.confidence.unwrap_or(0.0));
                        duplicates.push(Conflict::new(
                            ConflictType::Duplicate,
                            &a.id,
                            &b.id,
                            format!(
                                "Possible duplicate {}/{}: centers {:.1}px/{:.1}px apart",
                                a.category, a.object_type, distance.dx, distance.dy
                            ),
                            ConflictSeverity::Medium,
                            lowest < self.config.auto_resolve_confidence,
                        ));
                    }
                }

                if ga.intersects(gb, tolerance) {
                    overlaps.push(Conflict::new(
                        ConflictType::Overlap,
                        &a.id,
                        &b.id,
                        format!(
                            "Bounding boxes of {} and {} overlap within {}px",
                            a.object_type, b.object_type, tolerance
                        ),
                        ConflictSeverity::Low,
                        false,
                    ));
                }
            }
        }

        findings.conflicts = duplicates;
        findings.conflicts.extend(overlaps);
        findings.conflicts.sort_by(|x, y| {
            (&x.object1_id, &x.object2_id, x.conflict_type).cmp(&(
                &y.object1_id,
                &y.object2_id,
                y.conflict_type,
            ))
        });
        findings
    }

    /// Scan a plan and write the conflicts back onto its objects.
    ///
    /// Each object's conflict list is replaced with exactly the conflicts
    /// found in this run; resolution flags of identical records carry over.
    /// Objects that gained a conflict move from approved/detected to
    /// conflicted. Running twice on unchanged data writes nothing the
    /// second time.
    pub fn scan(
        &self,
        store: &dyn ObjectStore,
        policy: &ReviewPolicy,
        tenant_id: &TenantId,
        plan_id: &PlanId,
    ) -> Result<ScanReport> {
        let started_at = Utc::now();
        let objects = store.active_in_plan(tenant_id, plan_id)?;
        let findings = self.detect(&objects);

        let mut per_object: HashMap<ObjectId, Vec<Conflict>> = HashMap::new();
        for conflict in &findings.conflicts {
            for id in [&conflict.object1_id, &conflict.object2_id] {
                per_object.entry(id.clone()).or_default().push(conflict.clone());
            }
        }

        let audit = Audit::new(SCAN_ACTOR, "conflict_scan");
        let mut objects_updated = 0;

        for object in &objects {
            let fresh = per_object.get(&object.id).cloned().unwrap_or_default();
            let changed = Cell::new(false);

            let result = store.update(tenant_id, &object.id, &audit, &mut |current| {
                if !current.is_listed() {
                    changed.set(false);
                    return Ok(());
                }
                let before = (current.conflicts.clone(), current.status, current.requires_review);

                let mut next = fresh.clone();
                for conflict in &mut next {
                    let previous = current.conflicts.iter().find(|p| p.key() == conflict.key());
                    if let Some(previous) = previous {
                        conflict.resolved = previous.resolved;
                    }
                }
                let newly_attached = next
                    .iter()
                    .any(|c| !current.conflicts.iter().any(|p| p.key() == c.key()));

                current.conflicts = next;
                if newly_attached && Transition::AttachConflict.allowed_from(current.status) {
                    current.status = Transition::AttachConflict.target();
                }
                policy.settle(current);

                let after = (current.conflicts.clone(), current.status, current.requires_review);
                changed.set(before != after);
                Ok(())
            });

            match result {
                Ok(_) if changed.get() => objects_updated += 1,
                Ok(_) => {}
                Err(FloorscanError::NotFound(_)) => {
                    debug!(id = %object.id, "object removed during scan");
                }
                Err(e) => return Err(e),
            }
        }

        let report = ScanReport {
            tenant_id: tenant_id.clone(),
            plan_id: plan_id.clone(),
            objects_scanned: objects.len(),
            pairs_compared: findings.pairs_compared,
            conflicts: findings.conflicts,
            integrity_warnings: findings.warnings,
            objects_updated,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            tenant = %tenant_id,
            plan = %plan_id,
            objects = report.objects_scanned,
            duplicates = report.count(ConflictType::Duplicate),
            overlaps = report.count(ConflictType::Overlap),
            warnings = report.integrity_warnings.len(),
            updated = report.objects_updated,
            "conflict scan finished"
        );
        Ok(report)
    }
}

fn integrity_problem(object: &InfraObject) -> Option<String> {
    let Some(ref geometry) = object.geometry else {
        return Some("missing geometry".to_string());
    };
    geometry
        .validate()
        .err()
        .or_else(|| object.validate_confidence().err())
}
