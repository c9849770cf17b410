//! Conflict scan performance benchmarks.
//!
//! The detector compares every pair on a plan, so these measure how scan
//! time grows with plan size and with how crowded the plan is.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use floorscan::{
    BoundingBox, ConflictDetector, Detection, Floorscan, Geometry, InfraObject, PlanId, TenantId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TYPES: [(&str, &str); 4] = [
    ("access", "door"),
    ("safety", "fire_extinguisher"),
    ("safety", "emergency_exit"),
    ("electrical", "outlet"),
];

/// Ingest `count` detections scattered over a `span` x `span` plan.
fn populated_engine(count: usize, span: f64) -> Floorscan {
    let mut rng = StdRng::seed_from_u64(42);
    let engine = Floorscan::new();
    let tenant = TenantId::from("bench");

    for i in 0..count {
        let (category, object_type) = TYPES[i % TYPES.len()];
        let x = rng.gen_range(0.0..span);
        let y = rng.gen_range(0.0..span);
        let geometry = Geometry::from_bbox(BoundingBox::new(x, y, 12.0, 12.0));
        let confidence = rng.gen_range(0.5..1.0);
        engine
            .ingest(
                &tenant,
                "ai:bench",
                Detection::new("plan", category, object_type, geometry, confidence),
            )
            .expect("ingest failed");
    }
    engine
}

fn plan_objects(engine: &Floorscan) -> Vec<InfraObject> {
    engine
        .store()
        .active_in_plan(&TenantId::from("bench"), &PlanId::from("plan"))
        .expect("read failed")
}

fn bench_detect_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_by_size");
    let detector = ConflictDetector::default();

    for count in [50, 200, 800] {
        let objects = plan_objects(&populated_engine(count, 4000.0));
        let pairs = (count * (count - 1) / 2) as u64;
        group.throughput(Throughput::Elements(pairs));
        group.bench_with_input(BenchmarkId::from_parameter(count), &objects, |b, objects| {
            b.iter(|| detector.detect(black_box(objects)))
        });
    }
    group.finish();
}

fn bench_detect_by_density(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_by_density");
    let detector = ConflictDetector::default();

    for span in [400.0, 1500.0, 6000.0] {
        let objects = plan_objects(&populated_engine(300, span));
        group.bench_with_input(BenchmarkId::from_parameter(span as u64), &objects, |b, objects| {
            b.iter(|| detector.detect(black_box(objects)))
        });
    }
    group.finish();
}

fn bench_scan_write_back(c: &mut Criterion) {
    let tenant = TenantId::from("bench");
    let plan = PlanId::from("plan");

    c.bench_function("scan_plan_steady_state", |b| {
        let engine = populated_engine(300, 1500.0);
        engine.scan_plan(&tenant, &plan).expect("scan failed");
        // Later scans find nothing new to write.
        b.iter(|| engine.scan_plan(black_box(&tenant), black_box(&plan)))
    });
}

criterion_group!(
    benches,
    bench_detect_by_size,
    bench_detect_by_density,
    bench_scan_write_back
);
criterion_main!(benches);
