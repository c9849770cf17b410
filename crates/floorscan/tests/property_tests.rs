//! Property-based tests for geometry and conflict detection.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p floorscan --test property_tests
//!
//! # Run with more cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p floorscan --test property_tests
//! ```

use proptest::prelude::*;

use floorscan::{
    BoundingBox, ConflictDetector, ConflictType, Detection, Floorscan, Geometry, PlanId, TenantId,
};

// =============================================================================
// Test Strategies
// =============================================================================

fn coordinate() -> impl Strategy<Value = f64> {
    -1000.0f64..1000.0
}

fn extent() -> impl Strategy<Value = f64> {
    0.0f64..200.0
}

fn bounding_box() -> impl Strategy<Value = BoundingBox> {
    (coordinate(), coordinate(), extent(), extent())
        .prop_map(|(x, y, w, h)| BoundingBox::new(x, y, w, h))
}

fn tolerance() -> impl Strategy<Value = f64> {
    0.0f64..20.0
}

/// A small plan: (center x, center y, confidence, is_door) per object.
fn plan_layout() -> impl Strategy<Value = Vec<(f64, f64, f64, bool)>> {
    prop::collection::vec((0.0f64..200.0, 0.0f64..200.0, 0.0f64..=1.0, any::<bool>()), 0..12)
}

fn ingest_layout(engine: &Floorscan, layout: &[(f64, f64, f64, bool)]) {
    let tenant = TenantId::from("t");
    for (cx, cy, confidence, is_door) in layout {
        let (category, object_type) = if *is_door {
            ("access", "door")
        } else {
            ("safety", "fire_extinguisher")
        };
        let geometry = Geometry::from_bbox(BoundingBox::new(cx - 4.0, cy - 4.0, 8.0, 8.0));
        engine
            .ingest(
                &tenant,
                "ai:prop",
                Detection::new("p", category, object_type, geometry, *confidence),
            )
            .unwrap();
    }
}

// =============================================================================
// Geometry
// =============================================================================

proptest! {
    #[test]
    fn intersects_is_symmetric(a in bounding_box(), b in bounding_box(), tol in tolerance()) {
        prop_assert_eq!(a.intersects(&b, tol), b.intersects(&a, tol));
    }

    #[test]
    fn box_intersects_itself(a in bounding_box(), tol in tolerance()) {
        prop_assert!(a.intersects(&a, tol));
    }

    #[test]
    fn larger_tolerance_never_separates(
        a in bounding_box(),
        b in bounding_box(),
        tol in tolerance(),
        extra in 0.0f64..10.0,
    ) {
        if a.intersects(&b, tol) {
            prop_assert!(a.intersects(&b, tol + extra));
        }
    }

    #[test]
    fn center_distance_is_symmetric_and_non_negative(a in bounding_box(), b in bounding_box()) {
        let ga = Geometry::from_bbox(a);
        let gb = Geometry::from_bbox(b);
        let ab = ga.center_distance(&gb);
        let ba = gb.center_distance(&ga);
        prop_assert!(ab.dx >= 0.0 && ab.dy >= 0.0);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn valid_boxes_validate(a in bounding_box()) {
        prop_assert!(Geometry::from_bbox(a).validate().is_ok());
    }
}

// =============================================================================
// Conflict detection
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scan_is_idempotent(layout in plan_layout()) {
        let engine = Floorscan::new();
        ingest_layout(&engine, &layout);
        let (tenant, plan) = (TenantId::from("t"), PlanId::from("p"));

        let first = engine.scan_plan(&tenant, &plan).unwrap();
        let second = engine.scan_plan(&tenant, &plan).unwrap();

        prop_assert_eq!(&first.conflicts, &second.conflicts);
        prop_assert_eq!(second.objects_updated, 0);
    }

    #[test]
    fn conflicts_are_ordered_pairs(layout in plan_layout()) {
        let engine = Floorscan::new();
        ingest_layout(&engine, &layout);
        let report = engine.scan_plan(&TenantId::from("t"), &PlanId::from("p")).unwrap();

        for conflict in &report.conflicts {
            prop_assert!(conflict.object1_id < conflict.object2_id);
            if conflict.conflict_type == ConflictType::Overlap {
                prop_assert!(!conflict.auto_resolvable);
            }
        }
    }

    #[test]
    fn every_duplicate_also_overlaps(layout in plan_layout()) {
        // Centers within tolerance imply the inflated boxes touch.
        let engine = Floorscan::new();
        ingest_layout(&engine, &layout);
        let report = engine.scan_plan(&TenantId::from("t"), &PlanId::from("p")).unwrap();

        for dup in report.conflicts.iter().filter(|c| c.conflict_type == ConflictType::Duplicate) {
            let has_matching_overlap = report.conflicts.iter().any(|c| {
                c.conflict_type == ConflictType::Overlap
                    && c.object1_id == dup.object1_id
                    && c.object2_id == dup.object2_id
            });
            prop_assert!(has_matching_overlap);
        }
    }

    #[test]
    fn detect_ignores_input_order(layout in plan_layout()) {
        let engine = Floorscan::new();
        ingest_layout(&engine, &layout);
        let mut objects = engine
            .store()
            .active_in_plan(&TenantId::from("t"), &PlanId::from("p"))
            .unwrap();

        let detector = ConflictDetector::default();
        let forward = detector.detect(&objects);
        objects.reverse();
        let backward = detector.detect(&objects);
        prop_assert_eq!(forward, backward);
    }
}
