//! Status transition table.

use std::fmt;

use crate::error::{FloorscanError, Result};
use crate::object::ObjectStatus;

/// Something that moves an object between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Automatic: a detected object now needs review.
    QueueForReview,
    /// Validator explicitly asks for a review.
    RequestReview,
    /// Validator picks the object up.
    StartReview,
    Approve,
    Reject,
    /// The AI pipeline reported a rejected object again.
    Redetect,
    /// Geometry or properties were edited.
    Edit,
    /// Automatic: a scan attached a new conflict.
    AttachConflict,
    Archive,
}

impl Transition {
    /// Status the object ends up in.
    pub fn target(&self) -> ObjectStatus {
        match self {
            Transition::QueueForReview | Transition::RequestReview => ObjectStatus::PendingReview,
            Transition::StartReview => ObjectStatus::UnderReview,
            Transition::Approve => ObjectStatus::Approved,
            Transition::Reject => ObjectStatus::Rejected,
            Transition::Redetect => ObjectStatus::Detected,
            Transition::Edit => ObjectStatus::Modified,
            Transition::AttachConflict => ObjectStatus::Conflicted,
            Transition::Archive => ObjectStatus::Archived,
        }
    }

    /// Whether the transition may start from `from`.
    pub fn allowed_from(&self, from: ObjectStatus) -> bool {
        use ObjectStatus::*;
        match self {
            Transition::QueueForReview => from == Detected,
            Transition::RequestReview => {
                matches!(from, Detected | Modified | Approved | Conflicted)
            }
            Transition::StartReview => from == PendingReview,
            Transition::Approve => matches!(from, PendingReview | UnderReview | Conflicted),
            Transition::Reject => matches!(from, PendingReview | UnderReview),
            Transition::Redetect => from == Rejected,
            Transition::Edit | Transition::Archive => !from.is_terminal(),
            Transition::AttachConflict => matches!(from, Approved | Detected),
        }
    }

    /// Resulting status, or `InvalidTransition`.
    pub fn apply(&self, from: ObjectStatus) -> Result<ObjectStatus> {
        if self.allowed_from(from) {
            Ok(self.target())
        } else {
            Err(FloorscanError::InvalidTransition {
                from,
                to: self.target(),
            })
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::QueueForReview => "queue_for_review",
            Transition::RequestReview => "request_review",
            Transition::StartReview => "start_review",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Redetect => "redetect",
            Transition::Edit => "edit",
            Transition::AttachConflict => "attach_conflict",
            Transition::Archive => "archive",
        };
        f.write_str(name)
    }
}
