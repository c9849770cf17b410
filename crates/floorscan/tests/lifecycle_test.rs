//! Integration tests for the object lifecycle: ingest, scan, review, sweep.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use floorscan::review::ObjectEdit;
use floorscan::{
    BoundingBox, ConflictType, Criticality, Detection, EngineConfig, Floorscan, FloorscanError,
    Geometry, MemoryStore, NewObject, ObjectId, ObjectQuery, ObjectSource, ObjectStatus,
    ObjectStore, PlanId, ReviewerContext, TenantId,
};

fn tenant() -> TenantId {
    TenantId::from("acme")
}

fn plan() -> PlanId {
    PlanId::from("level-1")
}

fn validator() -> ReviewerContext {
    ReviewerContext::authorized("user:validator")
}

/// A 10x10 box centered at (cx, cy).
fn centered(cx: f64, cy: f64) -> Geometry {
    Geometry::from_bbox(BoundingBox::new(cx - 5.0, cy - 5.0, 10.0, 10.0))
}

fn detect(engine: &Floorscan, object_type: &str, cx: f64, cy: f64, confidence: f64) -> ObjectId {
    engine
        .ingest(
            &tenant(),
            "ai:detector",
            Detection::new("level-1", "safety", object_type, centered(cx, cy), confidence),
        )
        .expect("ingest failed")
        .id
}

// =============================================================================
// Conflict scan
// =============================================================================

#[test]
fn test_scan_flags_duplicates_and_moves_to_conflicted() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    let b = detect(&engine, "fire_extinguisher", 104.0, 103.0, 0.95);
    let far = detect(&engine, "fire_extinguisher", 400.0, 400.0, 0.95);

    let report = engine.scan_plan(&tenant(), &plan()).unwrap();
    assert_eq!(report.objects_scanned, 3);
    assert_eq!(report.count(ConflictType::Duplicate), 1);
    assert_eq!(report.count(ConflictType::Overlap), 1);
    assert_eq!(report.objects_updated, 2);

    for id in [&a, &b] {
        let obj = engine.get(&tenant(), id).unwrap();
        assert_eq!(obj.status, ObjectStatus::Conflicted);
        assert!(obj.requires_review);
        assert_eq!(obj.conflicts.len(), 2);
        assert_eq!(obj.blocking_conflicts().count(), 1);
    }
    let untouched = engine.get(&tenant(), &far).unwrap();
    assert!(untouched.conflicts.is_empty());
    assert_eq!(untouched.status, ObjectStatus::Detected);
}

#[test]
fn test_scan_twice_writes_nothing_new() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    detect(&engine, "fire_extinguisher", 101.0, 100.0, 0.9);

    engine.scan_plan(&tenant(), &plan()).unwrap();
    let first = engine.get(&tenant(), &a).unwrap();

    let second_report = engine.scan_plan(&tenant(), &plan()).unwrap();
    let second = engine.get(&tenant(), &a).unwrap();

    assert_eq!(second_report.objects_updated, 0);
    assert_eq!(first.conflicts, second.conflicts);
    assert_eq!(first.revision, second.revision);
    assert_eq!(first.modification_history.len(), second.modification_history.len());
}

#[test]
fn test_scan_clears_conflicts_after_object_moves() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    detect(&engine, "fire_extinguisher", 101.0, 100.0, 0.9);
    engine.scan_plan(&tenant(), &plan()).unwrap();

    engine
        .update_object(
            &tenant(),
            "user:editor",
            &a,
            &ObjectEdit::new().with_geometry(centered(600.0, 600.0)),
        )
        .unwrap();
    engine.scan_plan(&tenant(), &plan()).unwrap();

    let moved = engine.get(&tenant(), &a).unwrap();
    assert!(moved.conflicts.is_empty());
    assert_eq!(moved.status, ObjectStatus::Modified);
}

#[test]
fn test_low_confidence_duplicate_does_not_block_approval() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.6);
    detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.95);
    engine.scan_plan(&tenant(), &plan()).unwrap();

    let obj = engine.get(&tenant(), &a).unwrap();
    assert!(obj.conflicts.iter().any(|c| c.auto_resolvable));
    let approved = engine.approve(&validator(), &tenant(), &a).unwrap();
    assert_eq!(approved.status, ObjectStatus::Approved);
}

#[test]
fn test_deleted_objects_never_pair() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);

    engine
        .store()
        .update(
            &tenant(),
            &a,
            &floorscan::store::Audit::new("user:admin", "delete"),
            &mut |obj| {
                obj.is_deleted = true;
                Ok(())
            },
        )
        .unwrap();

    let report = engine.scan_plan(&tenant(), &plan()).unwrap();
    assert_eq!(report.objects_scanned, 1);
    assert!(report.conflicts.is_empty());
}

// =============================================================================
// Review workflow
// =============================================================================

#[test]
fn test_approval_blocked_until_duplicate_resolved() {
    let engine = Floorscan::new();
    let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    let b = detect(&engine, "fire_extinguisher", 102.0, 100.0, 0.9);
    engine.scan_plan(&tenant(), &plan()).unwrap();

    let err = engine.approve(&validator(), &tenant(), &a).unwrap_err();
    assert!(matches!(err, FloorscanError::ValidationConflict { blocking: 1, .. }));
    assert_eq!(engine.get(&tenant(), &a).unwrap().status, ObjectStatus::Conflicted);

    engine
        .resolve_conflict(&validator(), &tenant(), &a, &b, ConflictType::Duplicate)
        .unwrap();
    let approved = engine.approve(&validator(), &tenant(), &a).unwrap();
    assert_eq!(approved.status, ObjectStatus::Approved);
    assert!(approved.manually_validated);
    assert_eq!(approved.validated_by.as_deref(), Some("user:validator"));

    // Resolution survives a rescan, and no new conflict means no status change.
    engine.scan_plan(&tenant(), &plan()).unwrap();
    let after = engine.get(&tenant(), &a).unwrap();
    assert_eq!(after.status, ObjectStatus::Approved);
    assert!(after
        .conflicts
        .iter()
        .all(|c| c.conflict_type != ConflictType::Duplicate || c.resolved));
    assert!(engine.get(&tenant(), &b).unwrap().conflicts.iter().any(|c| c.resolved));
}

#[test]
fn test_new_conflict_reopens_approved_object() {
    let engine = Floorscan::new();
    let a = detect(&engine, "emergency_exit", 100.0, 100.0, 0.5);
    engine.approve(&validator(), &tenant(), &a).unwrap();

    detect(&engine, "fire_extinguisher", 108.0, 100.0, 0.95);
    engine.scan_plan(&tenant(), &plan()).unwrap();

    let reopened = engine.get(&tenant(), &a).unwrap();
    assert_eq!(reopened.status, ObjectStatus::Conflicted);
    assert_eq!(reopened.conflicts[0].conflict_type, ConflictType::Overlap);
}

#[test]
fn test_reject_then_redetect() {
    let engine = Floorscan::new();
    let id = detect(&engine, "fire_extinguisher", 50.0, 50.0, 0.4);
    assert_eq!(engine.get(&tenant(), &id).unwrap().status, ObjectStatus::PendingReview);

    engine.start_review(&validator(), &tenant(), &id).unwrap();
    let rejected = engine
        .reject(&validator(), &tenant(), &id, Some("shadow on the scan"))
        .unwrap();
    assert_eq!(rejected.status, ObjectStatus::Rejected);
    assert!(rejected.annotations[0].text.contains("shadow on the scan"));

    // Terminal for everything except redetection.
    let err = engine.approve(&validator(), &tenant(), &id).unwrap_err();
    assert!(matches!(
        err,
        FloorscanError::InvalidTransition {
            from: ObjectStatus::Rejected,
            to: ObjectStatus::Approved
        }
    ));

    let again = engine
        .redetect(&tenant(), "ai:detector", &id, centered(52.0, 50.0), 0.97)
        .unwrap();
    assert_eq!(again.status, ObjectStatus::Detected);
    assert!(!again.manually_validated);
    assert!(again.validated_by.is_none());
}

#[test]
fn test_unauthorized_validator_changes_nothing() {
    let engine = Floorscan::new();
    let id = detect(&engine, "fire_extinguisher", 50.0, 50.0, 0.4);
    let before = engine.get(&tenant(), &id).unwrap();

    let err = engine
        .approve(&ReviewerContext::denied("user:guest"), &tenant(), &id)
        .unwrap_err();
    assert!(matches!(err, FloorscanError::PermissionDenied(_)));
    assert_eq!(engine.get(&tenant(), &id).unwrap().revision, before.revision);
}

#[test]
fn test_edit_clears_validation_and_is_audited() {
    let engine = Floorscan::new();
    let id = detect(&engine, "fire_extinguisher", 50.0, 50.0, 0.4);
    engine.approve(&validator(), &tenant(), &id).unwrap();

    let edited = engine
        .update_object(
            &tenant(),
            "user:editor",
            &id,
            &ObjectEdit::new().with_name("Extinguisher by stair B"),
        )
        .unwrap();
    assert_eq!(edited.status, ObjectStatus::Modified);
    assert!(!edited.manually_validated);

    let actions: Vec<_> = edited
        .modification_history
        .iter()
        .map(|h| h.action.as_str())
        .collect();
    assert_eq!(actions, vec!["create", "approve", "edit"]);
    assert!(edited.modification_history[2].touches("name"));
}

#[test]
fn test_duplicated_source_starts_modified() {
    let engine = Floorscan::new();
    let copy = engine
        .create(
            &tenant(),
            "user:editor",
            NewObject::new("level-1", "access", "door", centered(10.0, 10.0))
                .with_source(ObjectSource::Duplicated),
        )
        .unwrap();
    assert_eq!(copy.status, ObjectStatus::Modified);

    let critical = engine
        .create(
            &tenant(),
            "user:editor",
            NewObject::new("level-1", "safety", "emergency_exit", centered(300.0, 10.0))
                .with_criticality(Criticality::Critical),
        )
        .unwrap();
    assert!(critical.requires_review);
    assert_eq!(critical.status, ObjectStatus::PendingReview);
}

#[test]
fn test_annotations_and_compliance_checks() {
    let engine = Floorscan::new();
    let id = detect(&engine, "fire_extinguisher", 50.0, 50.0, 0.9);

    engine
        .annotate(&tenant(), "user:inspector", &id, "Mounted too high")
        .unwrap();
    let checked = engine
        .record_compliance_check(
            &tenant(),
            "user:inspector",
            &id,
            "mount-height",
            false,
            Some("1.8m"),
        )
        .unwrap();

    assert_eq!(checked.annotations.len(), 1);
    assert_eq!(checked.compliance_checks.len(), 1);
    assert!(!checked.compliance_checks[0].passed);
    assert!(engine.annotate(&tenant(), "user:inspector", &id, "   ").is_err());
}

// =============================================================================
// Tenancy, queries and links
// =============================================================================

#[test]
fn test_other_tenant_sees_nothing() {
    let engine = Floorscan::new();
    let id = detect(&engine, "fire_extinguisher", 50.0, 50.0, 0.9);

    let outsider = TenantId::from("globex");
    assert!(matches!(engine.get(&outsider, &id), Err(FloorscanError::NotFound(_))));
    assert_eq!(engine.query(&outsider, &ObjectQuery::new()).unwrap().total, 0);
    assert_eq!(engine.statistics(&outsider, None).unwrap().total, 0);
}

#[test]
fn test_query_filters_and_order() {
    let engine = Floorscan::new();
    detect(&engine, "fire_extinguisher", 0.0, 0.0, 0.95);
    detect(&engine, "fire_extinguisher", 100.0, 0.0, 0.5);
    let newest = detect(&engine, "emergency_exit", 200.0, 0.0, 0.7);

    let review = engine
        .query(&tenant(), &ObjectQuery::for_plan("level-1").with_requires_review(true))
        .unwrap();
    assert_eq!(review.total, 2);

    let exits = engine
        .query(&tenant(), &ObjectQuery::new().with_kind("safety", "emergency_exit"))
        .unwrap();
    assert_eq!(exits.items[0].id, newest);

    let ranged = engine
        .query(&tenant(), &ObjectQuery::new().with_confidence_range(0.6, 0.8))
        .unwrap();
    assert_eq!(ranged.total, 1);
}

#[test]
fn test_parent_links_through_engine() {
    let engine = Floorscan::new();
    let panel = engine
        .create(
            &tenant(),
            "user:editor",
            NewObject::new("level-1", "electrical", "panel", centered(0.0, 0.0)),
        )
        .unwrap();
    let outlet = engine
        .create(
            &tenant(),
            "user:editor",
            NewObject::new("level-1", "electrical", "outlet", centered(50.0, 0.0))
                .with_parent(panel.id.clone()),
        )
        .unwrap();

    let chain = engine.ancestors(&tenant(), &outlet.id).unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].id, panel.id);

    let err = engine
        .set_parent(&tenant(), "user:editor", &panel.id, Some(&outlet.id))
        .unwrap_err();
    assert!(matches!(err, FloorscanError::Validation(_)));

    let (left, right) = engine
        .link_related(&tenant(), "user:editor", &panel.id, &outlet.id)
        .unwrap();
    assert!(left.related_object_ids.contains(&outlet.id));
    assert!(right.related_object_ids.contains(&panel.id));
}

// =============================================================================
// Statistics, retention and plan deletion
// =============================================================================

#[test]
fn test_statistics_over_lifecycle() {
    let engine = Floorscan::new();
    detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    detect(&engine, "fire_extinguisher", 101.0, 100.0, 0.7);
    detect(&engine, "emergency_exit", 500.0, 500.0, 0.95);
    engine.scan_plan(&tenant(), &plan()).unwrap();

    let stats = engine.statistics(&tenant(), Some(&plan())).unwrap();
    assert_eq!(stats.total, 3);
    // The low-confidence one was already pending, so it stays there.
    assert_eq!(stats.by_status.conflicted, 1);
    assert_eq!(stats.by_status.pending_review, 1);
    assert_eq!(stats.by_status.detected, 1);
    assert_eq!(stats.with_conflicts, 2);
    assert_eq!(stats.review_backlog, 2);
    // Lowest confidence is 0.7, so the duplicate is auto-resolvable.
    assert_eq!(stats.blocking_duplicates, 0);
    assert!((stats.average_confidence.unwrap() - 0.85).abs() < 1e-9);
    assert!((stats.average_quality.unwrap() - 85.0).abs() < 1e-9);
}

#[test]
fn test_sweep_soft_deletes_old_rejections() {
    let store = Arc::new(MemoryStore::new());
    let engine = Floorscan::with_config(EngineConfig::default().with_retention_days(30))
        .with_store(store.clone());

    let first = detect(&engine, "fire_extinguisher", 0.0, 0.0, 0.4);
    let second = detect(&engine, "fire_extinguisher", 300.0, 0.0, 0.4);
    engine.reject(&validator(), &tenant(), &first, None).unwrap();
    engine.reject(&validator(), &tenant(), &second, None).unwrap();

    // Nothing is old enough yet.
    assert_eq!(engine.sweep(None, Utc::now()).unwrap(), 0);

    let later = Utc::now() + Duration::days(31);
    assert_eq!(engine.sweep(None, later).unwrap(), 2);
    assert_eq!(engine.sweep(None, later).unwrap(), 0);
    assert_eq!(engine.sweep(Some(365), later).unwrap(), 0);
    assert!(matches!(
        engine.sweep(Some(u32::MAX), later),
        Err(FloorscanError::Validation(_))
    ));

    let swept = engine.get(&tenant(), &first).unwrap();
    assert!(swept.is_deleted);
    assert_eq!(swept.status, ObjectStatus::Rejected);
    assert_eq!(swept.modification_history.last().unwrap().actor, "system:retention");
    assert_eq!(engine.query(&tenant(), &ObjectQuery::new()).unwrap().total, 0);
    assert_eq!(
        engine
            .query(&tenant(), &ObjectQuery::new().including_deleted())
            .unwrap()
            .total,
        2
    );
    assert_eq!(store.len(), 2);
}

#[test]
fn test_delete_plan_cascades() {
    let engine = Floorscan::new();
    detect(&engine, "fire_extinguisher", 0.0, 0.0, 0.9);
    detect(&engine, "fire_extinguisher", 300.0, 0.0, 0.9);
    engine
        .ingest(
            &tenant(),
            "ai:detector",
            Detection::new("level-2", "safety", "fire_extinguisher", centered(0.0, 0.0), 0.9),
        )
        .unwrap();

    assert_eq!(engine.delete_plan(&tenant(), &plan()).unwrap(), 2);
    assert_eq!(engine.query(&tenant(), &ObjectQuery::new()).unwrap().total, 1);
    assert_eq!(engine.delete_plan(&TenantId::from("globex"), &PlanId::from("level-2")).unwrap(), 0);
}

// =============================================================================
// Persistence and concurrency
// =============================================================================

#[test]
fn test_snapshot_round_trip_with_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("site.floorscan.json");

    let store = Arc::new(MemoryStore::new());
    let engine = Floorscan::new().with_store(store.clone());
    let id = detect(&engine, "fire_extinguisher", 0.0, 0.0, 0.9);
    store.save_with_history(&path).unwrap();

    engine.annotate(&tenant(), "user:a", &id, "checked").unwrap();
    store.save_with_history(&path).unwrap();

    assert_eq!(MemoryStore::list_history(&path).unwrap().len(), 1);

    let reloaded = MemoryStore::load(&path).unwrap();
    let obj = reloaded.get(&tenant(), &id).unwrap();
    assert_eq!(obj.annotations.len(), 1);
    assert_eq!(obj.modification_history.len(), 2);

    let previous = MemoryStore::load_history(&path, 0).unwrap();
    assert!(previous.get(&tenant(), &id).unwrap().annotations.is_empty());
}

#[test]
fn test_concurrent_reviews_and_scans_keep_every_history_entry() {
    let engine = Arc::new(Floorscan::new());
    let ids: Vec<ObjectId> = (0..6)
        .map(|i| detect(&engine, "fire_extinguisher", i as f64 * 100.0, 0.0, 0.9))
        .collect();

    let mut handles = Vec::new();
    for worker in 0..4 {
        let engine = Arc::clone(&engine);
        let ids = ids.clone();
        handles.push(thread::spawn(move || {
            for (n, id) in ids.iter().enumerate() {
                engine
                    .annotate(&tenant(), &format!("user:{}", worker), id, &format!("note {}", n))
                    .unwrap();
                engine.scan_plan(&tenant(), &plan()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for id in &ids {
        let obj = engine.get(&tenant(), id).unwrap();
        assert_eq!(obj.annotations.len(), 4);
        // create + one entry per annotation
        assert_eq!(obj.modification_history.len(), 5);
        assert_eq!(obj.revision, 5);
    }
}

#[test]
fn test_approval_racing_a_scan_never_leaves_an_approved_duplicate() {
    for round in 0..50 {
        let engine = Arc::new(Floorscan::new());
        let a = detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
        detect(&engine, "fire_extinguisher", 102.0, 100.0, 0.9);
        engine.request_review(&validator(), &tenant(), &a).unwrap();
        let start = Arc::new(Barrier::new(2));

        let approver = {
            let (engine, start, a) = (Arc::clone(&engine), Arc::clone(&start), a.clone());
            thread::spawn(move || {
                start.wait();
                engine.approve(&validator(), &tenant(), &a)
            })
        };
        let scanner = {
            let (engine, start) = (Arc::clone(&engine), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                engine.scan_plan(&tenant(), &plan())
            })
        };
        let approval = approver.join().unwrap();
        scanner.join().unwrap().unwrap();

        let obj = engine.get(&tenant(), &a).unwrap();
        assert_eq!(obj.blocking_conflicts().count(), 1, "round {}", round);
        assert_ne!(obj.status, ObjectStatus::Approved, "round {}", round);
        match approval {
            // Approved first, then reopened by the scan.
            Ok(_) => {
                assert_eq!(obj.status, ObjectStatus::Conflicted, "round {}", round);
                assert!(obj.requires_review, "round {}", round);
            }
            Err(e) => {
                assert!(
                    matches!(e, FloorscanError::ValidationConflict { blocking: 1, .. }),
                    "round {}: {:?}",
                    round,
                    e
                );
                assert_eq!(obj.status, ObjectStatus::PendingReview, "round {}", round);
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawned_scan_and_sweep_jobs() {
    let engine = Floorscan::new();
    detect(&engine, "fire_extinguisher", 100.0, 100.0, 0.9);
    detect(&engine, "fire_extinguisher", 101.0, 100.0, 0.9);

    let scan = engine.spawn_scan(&tenant(), &plan()).unwrap();
    let scan_id = scan.id().to_string();
    let report = scan.wait().await.unwrap();
    assert_eq!(report.conflicts.len(), 2);

    let sweep = engine.spawn_sweep(Some(1)).unwrap();
    assert_eq!(sweep.wait().await.unwrap(), 0);

    let record = engine.jobs().get(&scan_id).unwrap();
    assert_eq!(record.status, floorscan::JobStatus::Succeeded);
    assert_eq!(record.outcome.unwrap()["objectsScanned"], 2);
    assert_eq!(engine.jobs().list().len(), 2);
}
