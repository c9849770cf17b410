//! Infra objects: the records managed by the engine.

mod history;
mod ids;
mod input;
mod model;
mod properties;

pub use history::{diff, FieldChange, HistoryEntry};
pub use ids::{ObjectId, PlanId, TenantId};
pub use input::{Detection, NewObject};
pub use model::{
    Annotation, ComplianceCheck, Criticality, InfraObject, ObjectSource, ObjectStatus,
    NEUTRAL_QUALITY_SCORE,
};
pub use properties::{ObjectDetails, ObjectProperties, MAX_EXTRA_DEPTH, MAX_EXTRA_FIELDS};

pub(crate) use input::validate_payload;
