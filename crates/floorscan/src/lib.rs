//! Floorscan: lifecycle engine for infrastructure objects on floor plans.
//!
//! Floorscan manages facility objects (doors, extinguishers, outlets, exits)
//! that an AI pipeline detected or a person drew on a floor plan. It finds
//! geometric conflicts between them and drives each object through a review
//! workflow until a validator approves or rejects it.
//!
//! # Core Principles
//!
//! - **Tenant-scoped**: every read and write is keyed by tenant
//! - **Audited**: every committed change appends a history entry, even under
//!   concurrent writers
//! - **Human-gated**: low confidence, conflicts and critical objects wait for
//!   a validator
//!
//! # Example
//!
//! ```
//! use floorscan::{BoundingBox, Detection, Floorscan, Geometry, ObjectStatus, PlanId, TenantId};
//!
//! let engine = Floorscan::new();
//! let tenant = TenantId::from("acme");
//! let geometry = Geometry::from_bbox(BoundingBox::new(100.0, 100.0, 20.0, 20.0));
//!
//! for confidence in [0.9, 0.95] {
//!     let detection =
//!         Detection::new("plan-1", "safety", "fire_extinguisher", geometry, confidence);
//!     engine.ingest(&tenant, "ai:detector", detection).unwrap();
//! }
//!
//! let report = engine.scan_plan(&tenant, &PlanId::from("plan-1")).unwrap();
//! assert_eq!(report.conflicts.len(), 2); // one duplicate, one overlap
//!
//! let stats = engine.statistics(&tenant, None).unwrap();
//! assert_eq!(stats.by_status.get(ObjectStatus::Conflicted), 2);
//! ```

pub mod conflict;
pub mod error;
pub mod geometry;
pub mod jobs;
pub mod links;
pub mod object;
pub mod retention;
pub mod review;
pub mod stats;
pub mod store;

mod engine;

pub use crate::engine::{EngineConfig, Floorscan, DEFAULT_MAX_PAGE_SIZE};
pub use conflict::{Conflict, ConflictDetector, ConflictSeverity, ConflictType, ScanReport};
pub use error::{FloorscanError, Result};
pub use geometry::{BoundingBox, Geometry, Point};
pub use jobs::{JobHandle, JobKind, JobRecord, JobRegistry, JobStatus};
pub use object::{
    Criticality, Detection, InfraObject, NewObject, ObjectId, ObjectSource, ObjectStatus, PlanId,
    TenantId,
};
pub use retention::RetentionSweeper;
pub use review::{ObjectEdit, ReviewPolicy, ReviewerContext, Transition};
pub use stats::Statistics;
pub use store::{MemoryStore, ObjectQuery, ObjectStore, Page};
