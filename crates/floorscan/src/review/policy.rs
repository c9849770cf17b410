//! When does an object need a human to look at it.

use serde::{Deserialize, Serialize};

use crate::object::{InfraObject, ObjectStatus};

use super::transitions::Transition;

/// Default confidence below which detections need review.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Rules for the `requires_review` flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    pub confidence_threshold: f64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl ReviewPolicy {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Low confidence, any conflict, unvalidated high/critical criticality,
    /// or sitting in a review queue.
    pub fn requires_review(&self, object: &InfraObject) -> bool {
        let low_confidence = object
            .confidence
            .is_some_and(|c| c < self.confidence_threshold);
        let unvalidated_critical =
            object.criticality.needs_validation() && !object.manually_validated;

        low_confidence
            || !object.conflicts.is_empty()
            || unvalidated_critical
            || object.status.is_awaiting_review()
    }

    /// Recompute the flag and take the automatic detected → pending_review step.
    pub fn settle(&self, object: &mut InfraObject) {
        object.requires_review = self.requires_review(object);
        if object.status == ObjectStatus::Detected && object.requires_review {
            object.status = Transition::QueueForReview.target();
        }
    }
}
