//! Engine configuration and the `Floorscan` entry point.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::{
    ConflictDetector, ConflictType, DetectorConfig, ScanReport, DEFAULT_AUTO_RESOLVE_CONFIDENCE,
    DEFAULT_TOLERANCE_PX,
};
use crate::error::{FloorscanError, Result};
use crate::geometry::Geometry;
use crate::jobs::{JobHandle, JobKind, JobRegistry};
use crate::links::{self, DEFAULT_MAX_DEPTH};
use crate::object::{Detection, InfraObject, NewObject, ObjectId, PlanId, TenantId};
use crate::retention::{RetentionSweeper, DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};
use crate::review::{
    ObjectEdit, ReviewPolicy, Reviewer, ReviewerContext, DEFAULT_CONFIDENCE_THRESHOLD,
};
use crate::stats::{self, Statistics};
use crate::store::{
    Audit, MemoryStore, ObjectQuery, ObjectStore, Page, DEFAULT_MAX_RETRIES, DEFAULT_PER_PAGE,
};

/// Upper bound on `per_page` for queries.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 500;

/// Tunable engine settings, usually loaded from TOML.
///
/// ```toml
/// duplicate_tolerance_px = 5.0
/// review_confidence_threshold = 0.8
/// retention_days = 180
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pixel slack for duplicate and overlap checks.
    pub duplicate_tolerance_px: f64,
    /// Confidence below which objects need review.
    pub review_confidence_threshold: f64,
    /// Duplicates below this confidence are flagged auto-resolvable.
    pub auto_resolve_confidence: f64,
    /// Age at which rejected and archived objects are swept.
    pub retention_days: u32,
    /// Longest allowed parent chain.
    pub max_parent_depth: usize,
    /// Compare-and-swap attempts per update.
    pub max_update_retries: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_tolerance_px: DEFAULT_TOLERANCE_PX,
            review_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            auto_resolve_confidence: DEFAULT_AUTO_RESOLVE_CONFIDENCE,
            retention_days: DEFAULT_RETENTION_DAYS,
            max_parent_depth: DEFAULT_MAX_DEPTH,
            max_update_retries: DEFAULT_MAX_RETRIES,
            default_page_size: DEFAULT_PER_PAGE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FloorscanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_tolerance(mut self, px: f64) -> Self {
        self.duplicate_tolerance_px = px;
        self
    }

    pub fn with_review_threshold(mut self, threshold: f64) -> Self {
        self.review_confidence_threshold = threshold;
        self
    }

    pub fn with_auto_resolve_confidence(mut self, threshold: f64) -> Self {
        self.auto_resolve_confidence = threshold;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_max_parent_depth(mut self, depth: usize) -> Self {
        self.max_parent_depth = depth;
        self
    }

    pub fn with_max_update_retries(mut self, retries: u32) -> Self {
        self.max_update_retries = retries;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let probability = |name: &str, value: f64| {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(FloorscanError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )))
            }
        };

        if !self.duplicate_tolerance_px.is_finite() || self.duplicate_tolerance_px < 0.0 {
            return Err(FloorscanError::Config(format!(
                "duplicate_tolerance_px must be a non-negative number, got {}",
                self.duplicate_tolerance_px
            )));
        }
        probability("review_confidence_threshold", self.review_confidence_threshold)?;
        probability("auto_resolve_confidence", self.auto_resolve_confidence)?;
        if self.max_update_retries == 0 {
            return Err(FloorscanError::Config("max_update_retries must be at least 1".to_string()));
        }
        if self.max_parent_depth == 0 {
            return Err(FloorscanError::Config("max_parent_depth must be at least 1".to_string()));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(FloorscanError::Config(format!(
                "retention_days must be at most {}, got {}",
                MAX_RETENTION_DAYS, self.retention_days
            )));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(FloorscanError::Config(format!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            )));
        }
        Ok(())
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy::new(self.review_confidence_threshold)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            tolerance_px: self.duplicate_tolerance_px,
            auto_resolve_confidence: self.auto_resolve_confidence,
        }
    }
}

/// The infra-object lifecycle engine.
///
/// Wraps a store handle with the review policy, conflict detector,
/// retention sweeper and job registry configured from one [`EngineConfig`].
///
/// # Example
///
/// ```
/// use floorscan::{BoundingBox, Detection, Floorscan, Geometry, TenantId};
///
/// let engine = Floorscan::new();
/// let tenant = TenantId::from("acme");
/// let door = Detection::new(
///     "plan-1",
///     "access",
///     "door",
///     Geometry::from_bbox(BoundingBox::new(10.0, 10.0, 20.0, 40.0)),
///     0.65,
/// );
/// let object = engine.ingest(&tenant, "ai:detector", door).unwrap();
/// assert!(object.requires_review);
/// ```
pub struct Floorscan {
    config: EngineConfig,
    store: Arc<dyn ObjectStore>,
    jobs: JobRegistry,
}

impl Default for Floorscan {
    fn default() -> Self {
        Self::new()
    }
}

impl Floorscan {
    /// Create an engine over an empty in-memory store with default settings.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine over an empty in-memory store.
    pub fn with_config(config: EngineConfig) -> Self {
        let store = MemoryStore::new().with_max_retries(config.max_update_retries);
        Self {
            config,
            store: Arc::new(store),
            jobs: JobRegistry::new(),
        }
    }

    /// Use an existing store, for example one loaded from a snapshot.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    fn policy(&self) -> ReviewPolicy {
        self.config.review_policy()
    }

    fn reviewer(&self) -> Reviewer<'_> {
        Reviewer::new(self.store.as_ref(), self.policy())
    }

    fn detector(&self) -> ConflictDetector {
        ConflictDetector::new(self.config.detector_config())
    }

    // Reads

    /// Filtered listing. Page size falls back to the configured default and
    /// is capped at the configured maximum.
    pub fn query(&self, tenant_id: &TenantId, query: &ObjectQuery) -> Result<Page<InfraObject>> {
        let mut query = query.clone();
        let per_page = query
            .per_page
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size)
            .max(1);
        query.per_page = Some(per_page);
        self.store.query(tenant_id, &query)
    }

    pub fn get(&self, tenant_id: &TenantId, id: &ObjectId) -> Result<InfraObject> {
        self.store.get(tenant_id, id)
    }

    // Creation

    /// Create an object by hand (or by import, template or duplication).
    pub fn create(&self, tenant_id: &TenantId, actor: &str, new: NewObject) -> Result<InfraObject> {
        let object = new.into_object(tenant_id.clone(), actor, Utc::now())?;
        self.insert_settled(object, actor)
    }

    /// Store one detection reported by the AI pipeline.
    pub fn ingest(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        detection: Detection,
    ) -> Result<InfraObject> {
        let object = detection.into_object(tenant_id.clone(), actor, Utc::now())?;
        self.insert_settled(object, actor)
    }

    /// Store a batch of detections. Every payload is validated before any
    /// object is written.
    pub fn ingest_all(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        detections: Vec<Detection>,
    ) -> Result<Vec<InfraObject>> {
        let now = Utc::now();
        let objects = detections
            .into_iter()
            .map(|d| d.into_object(tenant_id.clone(), actor, now))
            .collect::<Result<Vec<_>>>()?;
        objects
            .into_iter()
            .map(|object| self.insert_settled(object, actor))
            .collect()
    }

    fn insert_settled(&self, mut object: InfraObject, actor: &str) -> Result<InfraObject> {
        if let Some(ref parent_id) = object.parent_object_id {
            self.store.get(&object.tenant_id, parent_id)?;
        }
        self.policy().settle(&mut object);
        let object = self.store.insert(object, &Audit::new(actor, "create"))?;
        debug!(
            tenant = %object.tenant_id,
            id = %object.id,
            status = %object.status,
            requires_review = object.requires_review,
            "object created"
        );
        Ok(object)
    }

    // Edits and validator actions

    /// Apply a geometry/property edit. The object moves to `modified`.
    pub fn update_object(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        id: &ObjectId,
        edit: &ObjectEdit,
    ) -> Result<InfraObject> {
        self.reviewer().edit(actor, tenant_id, id, edit)
    }

    pub fn approve(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        self.reviewer().approve(ctx, tenant_id, id)
    }

    pub fn reject(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        reason: Option<&str>,
    ) -> Result<InfraObject> {
        self.reviewer().reject(ctx, tenant_id, id, reason)
    }

    pub fn request_review(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        self.reviewer().request_review(ctx, tenant_id, id)
    }

    pub fn start_review(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        self.reviewer().start_review(ctx, tenant_id, id)
    }

    pub fn archive(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
    ) -> Result<InfraObject> {
        self.reviewer().archive(ctx, tenant_id, id)
    }

    /// Reopen a rejected object that the AI pipeline reported again.
    pub fn redetect(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        id: &ObjectId,
        geometry: Geometry,
        confidence: f64,
    ) -> Result<InfraObject> {
        self.reviewer().redetect(actor, tenant_id, id, geometry, confidence)
    }

    pub fn resolve_conflict(
        &self,
        ctx: &ReviewerContext,
        tenant_id: &TenantId,
        id: &ObjectId,
        other_id: &ObjectId,
        conflict_type: ConflictType,
    ) -> Result<InfraObject> {
        self.reviewer()
            .resolve_conflict(ctx, tenant_id, id, other_id, conflict_type)
    }

    pub fn annotate(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        id: &ObjectId,
        text: &str,
    ) -> Result<InfraObject> {
        self.reviewer().annotate(actor, tenant_id, id, text)
    }

    pub fn record_compliance_check(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        id: &ObjectId,
        rule: &str,
        passed: bool,
        notes: Option<&str>,
    ) -> Result<InfraObject> {
        self.reviewer()
            .record_compliance_check(actor, tenant_id, id, rule, passed, notes)
    }

    // Links

    pub fn set_parent(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        child: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<InfraObject> {
        links::set_parent(
            self.store.as_ref(),
            tenant_id,
            child,
            parent,
            actor,
            self.config.max_parent_depth,
        )
    }

    pub fn ancestors(&self, tenant_id: &TenantId, id: &ObjectId) -> Result<Vec<InfraObject>> {
        links::ancestors(self.store.as_ref(), tenant_id, id, self.config.max_parent_depth)
    }

    pub fn link_related(
        &self,
        tenant_id: &TenantId,
        actor: &str,
        a: &ObjectId,
        b: &ObjectId,
    ) -> Result<(InfraObject, InfraObject)> {
        links::link_related(self.store.as_ref(), tenant_id, a, b, actor)
    }

    // Batch work

    /// Run the conflict detector over one plan.
    pub fn scan_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<ScanReport> {
        self.detector()
            .scan(self.store.as_ref(), &self.policy(), tenant_id, plan_id)
    }

    /// Run a plan scan on the blocking pool. Requires a Tokio runtime.
    pub fn spawn_scan(
        &self,
        tenant_id: &TenantId,
        plan_id: &PlanId,
    ) -> Result<JobHandle<ScanReport>> {
        let store = Arc::clone(&self.store);
        let detector = self.detector();
        let policy = self.policy();
        let (tenant, plan) = (tenant_id.clone(), plan_id.clone());
        self.jobs.spawn(
            JobKind::ConflictScan,
            Some(tenant_id.clone()),
            Some(plan_id.clone()),
            move || detector.scan(store.as_ref(), &policy, &tenant, &plan),
        )
    }

    pub fn statistics(&self, tenant_id: &TenantId, plan_id: Option<&PlanId>) -> Result<Statistics> {
        stats::compute(self.store.as_ref(), tenant_id, plan_id)
    }

    /// Soft-delete old rejected and archived objects. `days_old` defaults
    /// to the configured retention window.
    pub fn sweep(&self, days_old: Option<u32>, now: DateTime<Utc>) -> Result<usize> {
        let days = days_old.unwrap_or(self.config.retention_days);
        RetentionSweeper::new(days).sweep(self.store.as_ref(), now)
    }

    /// Run a sweep on the blocking pool. Requires a Tokio runtime.
    pub fn spawn_sweep(&self, days_old: Option<u32>) -> Result<JobHandle<usize>> {
        let store = Arc::clone(&self.store);
        let sweeper = RetentionSweeper::new(days_old.unwrap_or(self.config.retention_days));
        self.jobs.spawn(JobKind::RetentionSweep, None, None, move || {
            sweeper.sweep(store.as_ref(), Utc::now())
        })
    }

    /// Hard-delete every object on a plan. Returns the number removed.
    pub fn delete_plan(&self, tenant_id: &TenantId, plan_id: &PlanId) -> Result<usize> {
        let removed = self.store.delete_plan(tenant_id, plan_id)?;
        info!(tenant = %tenant_id, plan = %plan_id, removed, "plan deleted");
        Ok(removed)
    }
}
