//! Validator actions and object edits.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::{Conflict, ConflictType};
use crate::error::{FloorscanError, Result};
use crate::geometry::Geometry;
use crate::object::{
    validate_payload, Annotation, ComplianceCheck, Criticality, InfraObject, ObjectId,
    ObjectProperties, TenantId,
};
use crate::store::{Audit, ObjectStore};

use super::policy::ReviewPolicy;
use super::transitions::Transition;

/// Actor identity plus the authorization decision made by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerContext {
    pub actor: String,
    pub authorized: bool,
}

impl ReviewerContext {
    /// A caller allowed to perform validator actions.
    pub fn authorized(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            authorized: true,
        }
    }

    /// A caller the authorization layer turned down.
    pub fn denied(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            authorized: false,
        }
    }

    fn ensure(&self, action: &str) -> Result<()> {
        if self.authorized {
            Ok(())
        } else {
            Err(FloorscanError::PermissionDenied(format!(
                "'{}' is not allowed to {}",
                self.actor, action
            )))
        }
    }
}

/// A partial update of geometry and properties. Unset fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEdit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<ObjectProperties>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub criticality: Option<Criticality>,
}

impl ObjectEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_properties(mut self, properties: ObjectProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = Some(criticality);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.subtype.is_none()
            && self.geometry.is_none()
            && self.properties.is_none()
            && self.confidence.is_none()
            && self.criticality.is_none()
    }

    fn apply(&self, object: &mut InfraObject) -> Result<()> {
        if let Some(ref geometry) = self.geometry {
            validate_payload(geometry, self.confidence)?;
            object.geometry = Some(*geometry);
        } else if let Some(c) = self.confidence {
            if !c.is_finite() || !(0.0..=1.0).contains(&c) {
                return Err(FloorscanError::Validation(format!(
                    "confidence {} is outside [0, 1]",
                    c
                )));
            }
        }
        if let Some(ref properties) = self.properties {
            properties.validate(&object.category, &object.object_type)?;
            object.properties = properties.clone();
        }
        if let Some(ref name) = self.name {
            object.name = Some(name.clone());
        }
        if let Some(ref description) = self.description {
            object.description = Some(description.clone());
        }
        if let Some(ref subtype) = self.subtype {
            object.subtype = Some(subtype.clone());
        }
        if let Some(confidence) = self.confidence {
            object.confidence = Some(confidence);
        }
        if let Some(criticality) = self.criticality {
            object.criticality = criticality;
        }
        Ok(())
    }
}

/// Runs state-machine guarded writes against a store.
pub struct Reviewer<'a> {
    store: &'a dyn ObjectStore,
    policy: ReviewPolicy,
}

impl<'a> Reviewer<'a> {
    pub fn new(store: &'a dyn ObjectStore, policy: ReviewPolicy) -> Self {
        Self { store, policy }
    }

    /// Approve an object awaiting review.
    ///
    /// Fails with `ValidationConflict` while any duplicate conflict that is
    /// not auto-resolvable remains unresolved. The guard is evaluated on the
    /// version being committed, so a scan landing concurrently is honored.
    pub fn approve(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        ctx.ensure("approve objects")?;
        let policy = self.policy;
        let actor = ctx.actor.clone();

        let approved = self.store.update(
            tenant_id,
            id,
            &Audit::new(&ctx.actor, "approve"),
            &mut |obj| {
                let target = Transition::Approve.apply(obj.status)?;
                let blocking = obj.blocking_conflicts().count();
                if blocking > 0 {
                    return Err(FloorscanError::ValidationConflict {
                        object_id: obj.id.to_string(),
                        blocking,
                    });
                }
                obj.status = target;
                obj.manually_validated = true;
                obj.validated_at = Some(Utc::now());
                obj.validated_by = Some(actor.clone());
                obj.requires_review = policy.requires_review(obj);
                Ok(())
            },
        )?;

        info!(tenant = %tenant_id, id = %id, actor = %ctx.actor, "approved object");
        Ok(approved)
    }

    /// Reject an object awaiting review. The reason, if given, is kept as an
    /// annotation.
    pub fn reject(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        reason: Option<&str>,
    ) -> Result<InfraObject> {
        ctx.ensure("reject objects")?;
        let policy = self.policy;
        let actor = ctx.actor.clone();

        let rejected = self.store.update(
            tenant_id,
            id,
            &Audit::new(&ctx.actor, "reject"),
            &mut |obj| {
                obj.status = Transition::Reject.apply(obj.status)?;
                obj.manually_validated = false;
                obj.validated_at = Some(Utc::now());
                obj.validated_by = Some(actor.clone());
                if let Some(reason) = reason {
                    obj.annotations
                        .push(annotation(&actor, format!("Rejected: {}", reason)));
                }
                obj.requires_review = policy.requires_review(obj);
                Ok(())
            },
        )?;

        info!(tenant = %tenant_id, id = %id, actor = %ctx.actor, "rejected object");
        Ok(rejected)
    }

    /// Put an object (back) into the review queue.
    pub fn request_review(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        ctx.ensure("request reviews")?;
        self.transition(ctx, tenant_id, id, Transition::RequestReview)
    }

    /// Claim a pending object for review.
    pub fn start_review(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        ctx.ensure("start reviews")?;
        self.transition(ctx, tenant_id, id, Transition::StartReview)
    }

    /// Retire an object. Only the retention sweeper deletes it later.
    pub fn archive(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        ctx.ensure("archive objects")?;
        self.transition(ctx, tenant_id, id, Transition::Archive)
    }

    /// Reopen a rejected object that the AI pipeline detected again.
    pub fn redetect(
        &self,
        actor: &str,
        tenant_id: &TenantId,
        id: &ObjectId,
        geometry: Geometry,
        confidence: f64,
    ) -> Result<InfraObject> {
        validate_payload(&geometry, Some(confidence))?;
        let policy = self.policy;

        self.store.update(
            tenant_id,
            id,
            &Audit::new(actor, "redetect"),
            &mut |obj| {
                obj.status = Transition::Redetect.apply(obj.status)?;
                obj.geometry = Some(geometry);
                obj.confidence = Some(confidence);
                obj.manually_validated = false;
                obj.validated_at = None;
                obj.validated_by = None;
                policy.settle(obj);
                Ok(())
            },
        )
    }

    /// Edit geometry or properties. Moves the object to `modified` and
    /// clears any earlier validation.
    pub fn edit(
        &self,
        actor: &str,
        tenant_id: &TenantId,
        id: &ObjectId,
        edit: &ObjectEdit,
    ) -> Result<InfraObject> {
        if edit.is_empty() {
            return self.store.get(tenant_id, id);
        }
        let policy = self.policy;

        self.store.update(
            tenant_id,
            id,
            &Audit::new(actor, "edit"),
            &mut |obj| {
                let target = Transition::Edit.apply(obj.status)?;
                edit.apply(obj)?;
                obj.status = target;
                obj.manually_validated = false;
                obj.validated_at = None;
                obj.validated_by = None;
                policy.settle(obj);
                Ok(())
            },
        )
    }

    /// Mark a conflict resolved on both objects of the pair.
    pub fn resolve_conflict(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        other_id: &ObjectId,
        conflict_type: ConflictType,
    ) -> Result<InfraObject> {
        ctx.ensure("resolve conflicts")?;
        let audit = Audit::new(&ctx.actor, "resolve_conflict");

        let resolve = |target: &ObjectId, counterpart: &ObjectId, newly: &mut bool| {
            self.store.update(tenant_id, target, &audit, &mut |obj| {
                let conflict = pair_conflict(obj, conflict_type, target, counterpart)?;
                *newly = !conflict.resolved;
                conflict.resolved = true;
                Ok(())
            })
        };

        let mut first_newly = false;
        let resolved = resolve(id, other_id, &mut first_newly)?;

        // A partner that no longer carries the conflict has nothing to mark.
        let mut second_newly = false;
        match resolve(other_id, id, &mut second_newly) {
            Ok(_) | Err(FloorscanError::NotFound(_)) => {}
            Err(e) => {
                if first_newly {
                    self.reopen_conflict(ctx, tenant_id, id, other_id, conflict_type);
                }
                return Err(e);
            }
        }

        debug!(tenant = %tenant_id, id = %id, other = %other_id, "resolved conflict");
        Ok(resolved)
    }

    /// Undo one side of a half-applied resolution.
    fn reopen_conflict(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        other_id: &ObjectId,
        conflict_type: ConflictType,
    ) {
        let audit = Audit::new(&ctx.actor, "resolve_conflict_rollback");
        let result = self.store.update(tenant_id, id, &audit, &mut |obj| {
            if let Ok(conflict) = pair_conflict(obj, conflict_type, id, other_id) {
                conflict.resolved = false;
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(
                tenant = %tenant_id,
                id = %id,
                other = %other_id,
                error = %e,
                "could not roll back conflict resolution"
            );
        }
    }

    /// Attach a user comment.
    pub fn annotate(
        &self,
        actor: &str,
        tenant_id: &TenantId,
        id: &ObjectId,
        text: &str,
    ) -> Result<InfraObject> {
        if text.trim().is_empty() {
            return Err(FloorscanError::Validation(
                "Annotation text cannot be empty".to_string(),
            ));
        }
        self.store.update(
            tenant_id,
            id,
            &Audit::new(actor, "annotate"),
            &mut |obj| {
                obj.annotations.push(annotation(actor, text.to_string()));
                Ok(())
            },
        )
    }

    /// Record the outcome of a compliance rule check.
    pub fn record_compliance_check(
        &self,
        actor: &str,
        tenant_id: &TenantId,
        id: &ObjectId,
        rule: &str,
        passed: bool,
        notes: Option<&str>,
    ) -> Result<InfraObject> {
        self.store.update(
            tenant_id,
            id,
            &Audit::new(actor, "compliance_check"),
            &mut |obj| {
                obj.compliance_checks.push(ComplianceCheck {
                    rule: rule.to_string(),
                    passed,
                    checked_at: Utc::now(),
                    checked_by: actor.to_string(),
                    notes: notes.map(str::to_string),
                });
                Ok(())
            },
        )
    }

    fn transition(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        transition: Transition,
    ) -> Result<InfraObject> {
        let policy = self.policy;
        let updated = self.store.update(
            tenant_id,
            id,
            &Audit::new(&ctx.actor, transition.to_string()),
            &mut |obj| {
                obj.status = transition.apply(obj.status)?;
                obj.requires_review = policy.requires_review(obj);
                Ok(())
            },
        )?;
        debug!(
            tenant = %tenant_id,
            id = %id,
            %transition,
            status = %updated.status,
            "status changed"
        );
        Ok(updated)
    }
}

fn pair_conflict<'o>(
    obj: &'o mut InfraObject,
    conflict_type: ConflictType,
    target: &ObjectId,
    counterpart: &ObjectId,
) -> Result<&'o mut Conflict> {
    obj.conflicts
        .iter_mut()
        .find(|c| c.conflict_type == conflict_type && c.other(target) == Some(counterpart))
        .ok_or_else(|| {
            FloorscanError::NotFound(format!(
                "{} conflict between '{}' and '{}'",
                conflict_type.label(),
                target,
                counterpart
            ))
        })
}

fn annotation(author: &str, text: String) -> Annotation {
    Annotation {
        id: uuid::Uuid::new_v4().to_string(),
        author: author.to_string(),
        text,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{Conflict, ConflictSeverity};
    use crate::geometry::BoundingBox;
    use crate::object::test_support::sample_object;
    use crate::object::ObjectStatus;
    use crate::store::test_support::ContendedStore;
    use crate::store::MemoryStore;

    fn tenant() -> TenantId {
        TenantId::from("t1")
    }

    fn store_with(mut obj: InfraObject) -> MemoryStore {
        let store = MemoryStore::new();
        ReviewPolicy::default().settle(&mut obj);
        store.insert(obj, &Audit::new("user:seed", "create")).unwrap();
        store
    }

    fn pending(id: &str) -> InfraObject {
        let mut obj = sample_object(id);
        obj.confidence = Some(0.4);
        obj
    }

    fn duplicate(auto_resolvable: bool) -> Conflict {
        Conflict::new(
            ConflictType::Duplicate,
            &ObjectId::from("a"),
            &ObjectId::from("b"),
            "duplicate",
            ConflictSeverity::Medium,
            auto_resolvable,
        )
    }

    #[test]
    fn test_approve_sets_validation_fields() {
        let store = store_with(pending("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());

        let obj = reviewer
            .approve(&ReviewerContext::authorized("user:v"), &tenant(), &ObjectId::from("a"))
            .unwrap();

        assert_eq!(obj.status, ObjectStatus::Approved);
        assert!(obj.manually_validated);
        assert!(obj.validated_at.is_some());
        assert_eq!(obj.validated_by.as_deref(), Some("user:v"));
        assert_eq!(obj.modification_history.last().unwrap().action, "approve");
    }

    #[test]
    fn test_approve_requires_authorization() {
        let store = store_with(pending("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let err = reviewer
            .approve(&ReviewerContext::denied("user:x"), &tenant(), &ObjectId::from("a"))
            .unwrap_err();
        assert!(matches!(err, FloorscanError::PermissionDenied(_)));
    }

    #[test]
    fn test_approve_detected_is_invalid() {
        let store = store_with(sample_object("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let err = reviewer
            .approve(&ReviewerContext::authorized("user:v"), &tenant(), &ObjectId::from("a"))
            .unwrap_err();
        assert!(matches!(err, FloorscanError::InvalidTransition { .. }));
    }

    #[test]
    fn test_blocking_duplicate_prevents_approval_until_resolved() {
        let mut obj = pending("a");
        obj.conflicts.push(duplicate(false));
        let store = store_with(obj);
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let ctx = ReviewerContext::authorized("user:v");

        let err = reviewer.approve(&ctx, &tenant(), &ObjectId::from("a")).unwrap_err();
        assert!(matches!(err, FloorscanError::ValidationConflict { blocking: 1, .. }));
        assert_eq!(
            store.get(&tenant(), &ObjectId::from("a")).unwrap().status,
            ObjectStatus::PendingReview
        );

        reviewer
            .resolve_conflict(
                &ctx,
                &tenant(),
                &ObjectId::from("a"),
                &ObjectId::from("b"),
                ConflictType::Duplicate,
            )
            .unwrap();
        let approved = reviewer.approve(&ctx, &tenant(), &ObjectId::from("a")).unwrap();
        assert_eq!(approved.status, ObjectStatus::Approved);
    }

    #[test]
    fn test_failed_partner_update_reopens_first_side() {
        let inner = MemoryStore::new();
        for id in ["a", "b"] {
            let mut obj = pending(id);
            obj.conflicts.push(duplicate(false));
            inner.insert(obj, &Audit::new("user:seed", "create")).unwrap();
        }
        let store = ContendedStore::new(inner, "b");
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let (a, b) = (ObjectId::from("a"), ObjectId::from("b"));
        let before = store.get(&tenant(), &a).unwrap();

        let err = reviewer
            .resolve_conflict(
                &ReviewerContext::authorized("user:v"),
                &tenant(),
                &a,
                &b,
                ConflictType::Duplicate,
            )
            .unwrap_err();
        assert!(matches!(err, FloorscanError::Concurrency { .. }));

        let after = store.get(&tenant(), &a).unwrap();
        assert!(!after.conflicts[0].resolved);
        let actions: Vec<_> = after.modification_history[before.modification_history.len()..]
            .iter()
            .map(|e| e.action.as_str())
            .collect();
        assert_eq!(actions, vec!["resolve_conflict", "resolve_conflict_rollback"]);
        assert!(!store.get(&tenant(), &b).unwrap().conflicts[0].resolved);
    }

    #[test]
    fn test_rollback_keeps_an_earlier_resolution() {
        let inner = MemoryStore::new();
        for id in ["a", "b"] {
            let mut obj = pending(id);
            let mut conflict = duplicate(false);
            conflict.resolved = id == "a";
            obj.conflicts.push(conflict);
            inner.insert(obj, &Audit::new("user:seed", "create")).unwrap();
        }
        let store = ContendedStore::new(inner, "b");
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let a = ObjectId::from("a");
        let before = store.get(&tenant(), &a).unwrap();

        assert!(reviewer
            .resolve_conflict(
                &ReviewerContext::authorized("user:v"),
                &tenant(),
                &a,
                &ObjectId::from("b"),
                ConflictType::Duplicate,
            )
            .is_err());

        let after = store.get(&tenant(), &a).unwrap();
        assert!(after.conflicts[0].resolved);
        assert_eq!(after.revision, before.revision);
    }

    #[test]
    fn test_auto_resolvable_duplicate_does_not_block() {
        let mut obj = pending("a");
        obj.conflicts.push(duplicate(true));
        let store = store_with(obj);
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        assert!(reviewer
            .approve(&ReviewerContext::authorized("user:v"), &tenant(), &ObjectId::from("a"))
            .is_ok());
    }

    #[test]
    fn test_reject_is_terminal_until_redetected() {
        let store = store_with(pending("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let ctx = ReviewerContext::authorized("user:v");
        let id = ObjectId::from("a");

        let rejected = reviewer.reject(&ctx, &tenant(), &id, Some("false positive")).unwrap();
        assert_eq!(rejected.status, ObjectStatus::Rejected);
        assert_eq!(rejected.annotations[0].text, "Rejected: false positive");

        assert!(reviewer.request_review(&ctx, &tenant(), &id).is_err());
        let rename = ObjectEdit::new().with_name("x");
        assert!(reviewer.edit("user:v", &tenant(), &id, &rename).is_err());

        let geometry = Geometry::from_bbox(BoundingBox::new(1.0, 1.0, 10.0, 10.0));
        let back = reviewer.redetect("system:ai", &tenant(), &id, geometry, 0.95).unwrap();
        assert_eq!(back.status, ObjectStatus::Detected);
        assert!(back.validated_by.is_none());
    }

    #[test]
    fn test_edit_moves_to_modified_and_clears_validation() {
        let store = store_with(pending("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let id = ObjectId::from("a");
        reviewer
            .approve(&ReviewerContext::authorized("user:v"), &tenant(), &id)
            .unwrap();

        let geometry = Geometry::from_bbox(BoundingBox::new(5.0, 5.0, 10.0, 10.0));
        let edited = reviewer
            .edit("user:e", &tenant(), &id, &ObjectEdit::new().with_geometry(geometry))
            .unwrap();

        assert_eq!(edited.status, ObjectStatus::Modified);
        assert!(!edited.manually_validated);
        assert!(edited.requires_review);
        assert!(edited.modification_history.last().unwrap().touches("geometry"));
    }

    #[test]
    fn test_edit_critical_requires_review() {
        let store = store_with(sample_object("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let edited = reviewer
            .edit(
                "user:e",
                &tenant(),
                &ObjectId::from("a"),
                &ObjectEdit::new().with_criticality(Criticality::High),
            )
            .unwrap();
        assert!(edited.requires_review);
    }

    #[test]
    fn test_review_queue_flow() {
        let store = store_with(sample_object("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let ctx = ReviewerContext::authorized("user:v");
        let id = ObjectId::from("a");

        let pending = reviewer.request_review(&ctx, &tenant(), &id).unwrap();
        assert_eq!(pending.status, ObjectStatus::PendingReview);
        assert!(pending.requires_review);

        let claimed = reviewer.start_review(&ctx, &tenant(), &id).unwrap();
        assert_eq!(claimed.status, ObjectStatus::UnderReview);

        let archived = reviewer.archive(&ctx, &tenant(), &id).unwrap();
        assert_eq!(archived.status, ObjectStatus::Archived);
    }

    #[test]
    fn test_annotate_and_compliance() {
        let store = store_with(sample_object("a"));
        let reviewer = Reviewer::new(&store, ReviewPolicy::default());
        let id = ObjectId::from("a");

        reviewer.annotate("user:n", &tenant(), &id, "behind the shelf").unwrap();
        assert!(reviewer.annotate("user:n", &tenant(), &id, "  ").is_err());
        let obj = reviewer
            .record_compliance_check("user:n", &tenant(), &id, "egress_width", true, None)
            .unwrap();

        assert_eq!(obj.annotations.len(), 1);
        assert_eq!(obj.compliance_checks[0].rule, "egress_width");
        assert_eq!(obj.modification_history.len(), 3);
    }
}
