//! Tenant-scoped storage of infra objects.
//!
//! Every read and write is keyed by `(tenant, id)`. Writes go through
//! [`ObjectStore::update`], which applies a mutation to a private copy and
//! commits it together with one appended [`HistoryEntry`] only if no other
//! writer committed in between. Lost updates and dropped audit entries are
//! therefore impossible; contended writers simply retry.
//!
//! [`HistoryEntry`]: crate::object::HistoryEntry

mod memory;
mod persistence;
mod query;

pub use memory::{MemoryStore, DEFAULT_MAX_RETRIES};
pub use persistence::{history_directory, StoreSnapshot, SNAPSHOT_VERSION};
pub use query::{ObjectQuery, Page, DEFAULT_PER_PAGE};

use crate::error::Result;
use crate::object::{InfraObject, ObjectId, PlanId, TenantId};

/// Who is writing and why, recorded on the history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    pub actor: String,
    pub action: String,
}

impl Audit {
    pub fn new(actor: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
        }
    }
}

/// Mutation applied inside an optimistic update. May run more than once.
pub type Mutation<'a> = dyn FnMut(&mut InfraObject) -> Result<()> + 'a;

/// Storage backend for infra objects.
pub trait ObjectStore: Send + Sync {
    /// Store a new object, appending its creation entry.
    fn insert(&self, object: InfraObject, audit: &Audit) -> Result<InfraObject>;

    /// Fetch one object, including soft-deleted ones.
    fn get(&self, tenant_id: &TenantId, id: &ObjectId) -> Result<InfraObject>;

    /// Filtered, paginated listing, newest first.
    fn query(&self, tenant_id: &TenantId, query: &ObjectQuery) -> Result<Page<InfraObject>>;

    /// All listed objects on a plan, sorted by id.
    fn active_in_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<Vec<InfraObject>>;

    /// Point-in-time copy of every record across tenants.
    fn snapshot(&self) -> Result<Vec<InfraObject>>;

    /// Apply `mutate` atomically. Returns the committed object, or the
    /// unchanged one when the mutation produced no difference.
    fn update(
        &self,
        tenant_id: &TenantId,
        id: &ObjectId,
        audit: &Audit,
        mutate: &mut Mutation<'_>,
    ) -> Result<InfraObject>;

    /// Hard-delete every object on a plan. Returns the number removed.
    fn delete_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<usize>;
}
