//! Background jobs for scans and sweeps.
//!
//! Jobs run on Tokio's blocking pool and are tracked in a [`JobRegistry`]
//! that can be polled by id while they run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FloorscanError, Result};
use crate::object::{PlanId, TenantId};

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ConflictScan,
    RetentionSweep,
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::ConflictScan => "conflict scan",
            JobKind::RetentionSweep => "retention sweep",
        }
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Registry entry for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub tenant_id: Option<TenantId>,
    pub plan_id: Option<PlanId>,

    /// JSON form of the job's result once it succeeds.
    pub outcome: Option<serde_json::Value>,
    pub error: Option<String>,

    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared, cloneable record of every job started by an engine.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<String, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Run `work` on the blocking pool of the current Tokio runtime.
    ///
    /// Fails with [`FloorscanError::Job`] when called outside a runtime.
    pub fn spawn<T, F>(
        &self,
        kind: JobKind,
        tenant_id: Option<TenantId>,
        plan_id: Option<PlanId>,
        work: F,
    ) -> Result<JobHandle<T>>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| {
            FloorscanError::Job(format!("no async runtime for {}: {}", kind.label(), e))
        })?;

        let id = Uuid::new_v4().to_string();
        self.jobs.insert(
            id.clone(),
            JobRecord {
                id: id.clone(),
                kind,
                status: JobStatus::Queued,
                tenant_id,
                plan_id,
                outcome: None,
                error: None,
                queued_at: Utc::now(),
                started_at: None,
                finished_at: None,
            },
        );
        debug!(job = %id, kind = kind.label(), "job queued");

        let registry = self.clone();
        let job_id = id.clone();
        let handle = runtime.spawn_blocking(move || {
            registry.mark_running(&job_id);
            let result = work();
            registry.finish(&job_id, &result);
            result
        });

        Ok(JobHandle { id, handle })
    }

    fn mark_running(&self, id: &str) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
        }
    }

    fn finish<T: Serialize>(&self, id: &str, result: &Result<T>) {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return;
        };
        job.finished_at = Some(Utc::now());
        match result {
            Ok(value) => {
                job.status = JobStatus::Succeeded;
                job.outcome = serde_json::to_value(value).ok();
                debug!(job = %id, kind = job.kind.label(), "job succeeded");
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
                warn!(job = %id, kind = job.kind.label(), error = %e, "job failed");
            }
        }
    }
}

/// Handle to a spawned job.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: String,
    handle: JoinHandle<Result<T>>,
}

impl<T> JobHandle<T> {
    /// Registry id of the job.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the job and return its result.
    pub async fn wait(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| FloorscanError::Job(format!("job {} did not complete: {}", self.id, e)))?
    }
}
