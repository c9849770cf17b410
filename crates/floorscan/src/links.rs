//! Parent and related-object links.
//!
//! Links are stored as ids and resolved through the store on demand. Parent
//! chains are walked with a depth limit and a visited set, so a corrupted
//! chain surfaces as an error instead of looping.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{FloorscanError, Result};
use crate::object::{InfraObject, ObjectId, TenantId};
use crate::store::{Audit, ObjectStore};

/// Default limit on parent chain length.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Parent chain of `id`, nearest first.
///
/// A parent id that no longer resolves ends the chain. A chain that revisits
/// an object or runs past `max_depth` is a data-integrity error.
pub fn ancestors(
    store: &dyn ObjectStore,
    tenant_id: &TenantId,
    id: &ObjectId,
    max_depth: usize,
) -> Result<Vec<InfraObject>> {
    let start = store.get(tenant_id, id)?;
    let mut seen: HashSet<ObjectId> = HashSet::from([start.id.clone()]);
    let mut chain = Vec::new();
    let mut next = start.parent_object_id.clone();

    while let Some(parent_id) = next {
        if chain.len() >= max_depth {
            return Err(FloorscanError::DataIntegrity {
                object_id: id.to_string(),
                message: format!("parent chain is longer than {}", max_depth),
            });
        }
        if !seen.insert(parent_id.clone()) {
            return Err(FloorscanError::DataIntegrity {
                object_id: id.to_string(),
                message: format!("parent chain loops back to '{}'", parent_id),
            });
        }

        let parent = match store.get(tenant_id, &parent_id) {
            Ok(parent) => parent,
            Err(FloorscanError::NotFound(_)) => {
                warn!(id = %id, parent = %parent_id, "dangling parent link");
                break;
            }
            Err(e) => return Err(e),
        };
        next = parent.parent_object_id.clone();
        chain.push(parent);
    }

    Ok(chain)
}

/// Set or clear the parent of `child`.
///
/// Rejects self-parenting, unknown parents and any link that would make
/// `child` its own ancestor.
pub fn set_parent(
    store: &dyn ObjectStore,
    tenant_id: &TenantId,
    child: &ObjectId,
    parent: Option<&ObjectId>,
    actor: &str,
    max_depth: usize,
) -> Result<InfraObject> {
    if let Some(parent_id) = parent {
        if parent_id == child {
            return Err(FloorscanError::Validation(format!(
                "Object '{}' cannot be its own parent",
                child
            )));
        }
        store.get(tenant_id, child)?;

        let lineage = ancestors(store, tenant_id, parent_id, max_depth)?;
        if lineage.iter().any(|o| &o.id == child) {
            return Err(FloorscanError::Validation(format!(
                "Setting '{}' as parent of '{}' would create a cycle",
                parent_id, child
            )));
        }
        if lineage.len() + 1 > max_depth {
            return Err(FloorscanError::Validation(format!(
                "Parent chain of '{}' would exceed depth {}",
                child, max_depth
            )));
        }
    }

    let parent = parent.cloned();
    debug!(child = %child, parent = ?parent, "setting parent");
    store.update(tenant_id, child, &Audit::new(actor, "set_parent"), &mut |obj| {
        obj.parent_object_id = parent.clone();
        Ok(())
    })
}

/// Link two objects as related, on both sides.
///
/// Returns both objects after the link. Linking an existing pair again
/// writes nothing.
pub fn link_related(
    store: &dyn ObjectStore,
    tenant_id: &TenantId,
    a: &ObjectId,
    b: &ObjectId,
    actor: &str,
) -> Result<(InfraObject, InfraObject)> {
    if a == b {
        return Err(FloorscanError::Validation(format!(
            "Object '{}' cannot be related to itself",
            a
        )));
    }
    store.get(tenant_id, a)?;
    store.get(tenant_id, b)?;

    let audit = Audit::new(actor, "link_related");
    let mut added = false;
    let first = store.update(tenant_id, a, &audit, &mut |obj| {
        added = obj.related_object_ids.insert(b.clone());
        Ok(())
    })?;
    let second = match store.update(tenant_id, b, &audit, &mut |obj| {
        obj.related_object_ids.insert(a.clone());
        Ok(())
    }) {
        Ok(second) => second,
        Err(e) => {
            if added {
                unlink(store, tenant_id, a, b, actor);
            }
            return Err(e);
        }
    };
    Ok((first, second))
}

/// Remove `b` from `a`'s related set after the other side failed.
fn unlink(
    store: &dyn ObjectStore,
    tenant_id: &TenantId,
    a: &ObjectId,
    b: &ObjectId,
    actor: &str,
) {
    let audit = Audit::new(actor, "link_related_rollback");
    let result = store.update(tenant_id, a, &audit, &mut |obj| {
        obj.related_object_ids.remove(b);
        Ok(())
    });
    if let Err(e) = result {
        warn!(
            tenant = %tenant_id,
            id = %a,
            other = %b,
            error = %e,
            "could not roll back related link"
        );
    }
}
