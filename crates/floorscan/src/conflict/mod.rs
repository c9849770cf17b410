//! Geometric conflicts between objects on the same plan.
//!
//! Two independent passes run over every unordered pair `(A, B)` with
//! `A.id < B.id`:
//!
//! - **duplicate**: same category and type, centers within tolerance on
//!   both axes
//! - **overlap**: any two objects whose tolerance-inflated boxes touch
//!
//! A pair may produce both records.

mod detector;
mod record;

pub use detector::{
    ConflictDetector, DetectorConfig, Findings, IntegrityWarning, ScanReport,
    DEFAULT_AUTO_RESOLVE_CONFIDENCE, DEFAULT_TOLERANCE_PX, SCAN_ACTOR,
};
pub use record::{Conflict, ConflictSeverity, ConflictType};
