//! In-memory object store with optimistic concurrency.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::{FloorscanError, Result};
use crate::object::{diff, HistoryEntry, InfraObject, ObjectId, PlanId, TenantId};

use super::query::{ObjectQuery, Page, DEFAULT_PER_PAGE};
use super::{Audit, Mutation, ObjectStore};

/// Default number of compare-and-swap attempts per update.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

type Key = (TenantId, ObjectId);

/// Concurrent in-memory store, persisted as JSON snapshots.
#[derive(Debug)]
pub struct MemoryStore {
    objects: DashMap<Key, InfraObject>,
    max_retries: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the compare-and-swap retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Load records verbatim, without touching their history.
    pub fn from_objects(objects: impl IntoIterator<Item = InfraObject>) -> Self {
        let store = Self::new();
        for object in objects {
            store
                .objects
                .insert((object.tenant_id.clone(), object.id.clone()), object);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn key(tenant_id: &TenantId, id: &ObjectId) -> Key {
        (tenant_id.clone(), id.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn insert(&self, mut object: InfraObject, audit: &Audit) -> Result<InfraObject> {
        let key = Self::key(&object.tenant_id, &object.id);
        match self.objects.entry(key) {
            Entry::Occupied(_) => Err(FloorscanError::Validation(format!(
                "Object '{}' already exists in tenant '{}'",
                object.id, object.tenant_id
            ))),
            Entry::Vacant(slot) => {
                object.revision = 1;
                object.last_modified_by = audit.actor.clone();
                object
                    .modification_history
                    .push(HistoryEntry::new(&audit.actor, &audit.action, Vec::new()));

                debug!(tenant = %object.tenant_id, id = %object.id, "inserted object");
                slot.insert(object.clone());
                Ok(object)
            }
        }
    }

    fn get(&self, tenant_id: &TenantId, id: &ObjectId) -> Result<InfraObject> {
        self.objects
            .get(&Self::key(tenant_id, id))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FloorscanError::object_not_found(tenant_id, id))
    }

    fn query(&self, tenant_id: &TenantId, query: &ObjectQuery) -> Result<Page<InfraObject>> {
        let mut matches: Vec<InfraObject> = self
            .objects
            .iter()
            .filter(|entry| &entry.key().0 == tenant_id && query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(Page::paginate(
            matches,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        ))
    }

    fn active_in_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<Vec<InfraObject>> {
        let mut objects: Vec<InfraObject> = self
            .objects
            .iter()
            .filter(|entry| {
                let obj = entry.value();
                &entry.key().0 == tenant_id && &obj.plan_id == plan_id && obj.is_listed()
            })
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(objects)
    }

    fn snapshot(&self) -> Result<Vec<InfraObject>> {
        let mut objects: Vec<InfraObject> =
            self.objects.iter().map(|entry| entry.value().clone()).collect();
        objects.sort_by(|a, b| (&a.tenant_id, &a.id).cmp(&(&b.tenant_id, &b.id)));
        Ok(objects)
    }

    fn update(
        &self,
        tenant_id: &TenantId,
        id: &ObjectId,
        audit: &Audit,
        mutate: &mut Mutation<'_>,
    ) -> Result<InfraObject> {
        let key = Self::key(tenant_id, id);

        for attempt in 1..=self.max_retries {
            let current = self.get(tenant_id, id)?;

            let mut next = current.clone();
            mutate(&mut next)?;

            if next.id != current.id || next.tenant_id != current.tenant_id {
                return Err(FloorscanError::Validation(
                    "Object identity cannot be changed".to_string(),
                ));
            }

            let changes = diff(&current, &next)?;
            if changes.is_empty() {
                return Ok(current);
            }

            // History is append-only regardless of what the mutation did.
            next.modification_history = current.modification_history.clone();
            next.modification_history
                .push(HistoryEntry::new(&audit.actor, &audit.action, changes));
            next.revision = current.revision + 1;
            next.updated_at = Utc::now();
            next.last_modified_by = audit.actor.clone();

            match self.objects.get_mut(&key) {
                None => return Err(FloorscanError::object_not_found(tenant_id, id)),
                Some(mut entry) if entry.revision == current.revision => {
                    *entry = next.clone();
                    debug!(
                        tenant = %tenant_id,
                        id = %id,
                        action = %audit.action,
                        revision = next.revision,
                        "committed update"
                    );
                    return Ok(next);
                }
                Some(_) => {
                    debug!(id = %id, attempt, "revision moved, retrying update");
                }
            }
        }

        warn!(
            tenant = %tenant_id,
            id = %id,
            attempts = self.max_retries,
            "update retries exhausted"
        );
        Err(FloorscanError::Concurrency {
            object_id: id.to_string(),
            attempts: self.max_retries,
        })
    }

    fn delete_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<usize> {
        let before = self.objects.len();
        self.objects
            .retain(|key, obj| !(&key.0 == tenant_id && &obj.plan_id == plan_id));
        let removed = before.saturating_sub(self.objects.len());
        debug!(tenant = %tenant_id, plan = %plan_id, removed, "hard-deleted plan objects");
        Ok(removed)
    }
}
