//! Soft-deletion of long-closed objects.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{FloorscanError, Result};
use crate::object::InfraObject;
use crate::store::{Audit, ObjectStore};

/// Default age in days after which rejected or archived objects are swept.
pub const DEFAULT_RETENTION_DAYS: u32 = 180;

/// Longest accepted retention window, about a century.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Actor recorded on history entries written by the sweeper.
pub const RETENTION_ACTOR: &str = "system:retention";

/// Marks old rejected and archived objects as deleted, across all tenants.
#[derive(Debug, Clone, Copy)]
pub struct RetentionSweeper {
    days_old: u32,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

impl RetentionSweeper {
    pub fn new(days_old: u32) -> Self {
        Self { days_old }
    }

    pub fn days_old(&self) -> u32 {
        self.days_old
    }

    /// Objects created before this instant are eligible. `None` when the
    /// window reaches past the earliest representable time.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(Duration::days(i64::from(self.days_old)))
    }

    /// Whether `object` would be swept at `now`.
    pub fn is_eligible(&self, object: &InfraObject, now: DateTime<Utc>) -> bool {
        object.status.is_retainable()
            && !object.is_deleted
            && self.cutoff(now).is_some_and(|cutoff| object.created_at < cutoff)
    }

    /// Sweep once, returning the number of objects newly marked deleted.
    ///
    /// Each candidate is re-checked inside its own update, so an object
    /// that changed status since the snapshot is left alone. A second
    /// sweep at the same `now` finds nothing.
    pub fn sweep(&self, store: &dyn ObjectStore, now: DateTime<Utc>) -> Result<usize> {
        if self.days_old > MAX_RETENTION_DAYS || self.cutoff(now).is_none() {
            return Err(FloorscanError::Validation(format!(
                "retention window of {} days is out of range (max {})",
                self.days_old, MAX_RETENTION_DAYS
            )));
        }

        let candidates: Vec<InfraObject> = store
            .snapshot()?
            .into_iter()
            .filter(|o| self.is_eligible(o, now))
            .collect();

        let audit = Audit::new(RETENTION_ACTOR, "retention_sweep");
        let mut swept = 0;

        for candidate in &candidates {
            let mut marked = false;
            let mut mark = |obj: &mut InfraObject| {
                marked = self.is_eligible(obj, now);
                if marked {
                    obj.is_deleted = true;
                }
                Ok(())
            };
            let result = store.update(&candidate.tenant_id, &candidate.id, &audit, &mut mark);

            match result {
                Ok(_) if marked => swept += 1,
                Ok(_) => debug!(id = %candidate.id, "object no longer eligible for sweep"),
                Err(FloorscanError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!(
            days_old = self.days_old,
            candidates = candidates.len(),
            swept,
            "retention sweep finished"
        );
        Ok(swept)
    }
}
