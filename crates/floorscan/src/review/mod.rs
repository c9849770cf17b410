//! Review state machine.
//!
//! ```text
//!  detected ──(needs review)──▶ pending_review ──▶ under_review
//!     │                             │    ▲              │
//!     │ new conflict                │    │ request      ├──▶ approved ──(conflict)──▶ conflicted
//!     ▼                             ▼    │              │                                │
//!  conflicted ─────────────────▶ approved / rejected ◀──┘                     approve ◀──┘
//!
//!  any open status ──edit──▶ modified        any open status ──archive──▶ archived
//!  rejected ──redetect──▶ detected
//! ```
//!
//! Pure rules live in [`Transition`] and [`ReviewPolicy`]; [`Reviewer`]
//! applies them through a store so that each status change, its review
//! flags and its audit entry commit together.

mod actions;
mod policy;
mod transitions;

pub use actions::{ObjectEdit, Reviewer, ReviewerContext};
pub use policy::{ReviewPolicy, DEFAULT_CONFIDENCE_THRESHOLD};
pub use transitions::Transition;
