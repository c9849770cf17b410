//! Review commands - validator actions on single objects.

use colored::Colorize;
use floorscan::{ConflictType, ObjectId, ReviewerContext};

use crate::cli::ReviewAction;

use super::{status_label, CommandResult, Context, Session};

pub fn run(
    ctx: &Context,
    id: String,
    action: ReviewAction,
    reason: Option<String>,
    user: String,
) -> CommandResult {
    let session = Session::open(ctx)?;
    let id = ObjectId::from(id);
    // The CLI operator owns the local store file.
    let reviewer = ReviewerContext::authorized(user);
    let engine = &session.engine;

    let before = engine.get(&ctx.tenant, &id)?;
    let after = match action {
        ReviewAction::Approve => engine.approve(&reviewer, &ctx.tenant, &id)?,
        ReviewAction::Reject => engine.reject(&reviewer, &ctx.tenant, &id, reason.as_deref())?,
        ReviewAction::Request => engine.request_review(&reviewer, &ctx.tenant, &id)?,
        ReviewAction::Start => engine.start_review(&reviewer, &ctx.tenant, &id)?,
        ReviewAction::Archive => engine.archive(&reviewer, &ctx.tenant, &id)?,
    };
    session.save()?;

    println!(
        "{}  {} -> {}",
        id.to_string().white().bold(),
        status_label(before.status),
        status_label(after.status)
    );
    Ok(())
}

pub fn resolve(
    ctx: &Context,
    id: String,
    other: String,
    conflict_type: ConflictType,
    user: String,
) -> CommandResult {
    let session = Session::open(ctx)?;
    let id = ObjectId::from(id);
    let other = ObjectId::from(other);
    let reviewer = ReviewerContext::authorized(user);

    let updated = session
        .engine
        .resolve_conflict(&reviewer, &ctx.tenant, &id, &other, conflict_type)?;
    session.save()?;

    let blocking = updated.blocking_conflicts().count();
    println!(
        "{} {} conflict between {} and {}",
        "Resolved".green().bold(),
        conflict_type.label().to_lowercase(),
        id,
        other
    );
    if blocking > 0 {
        println!("  {} blocking duplicate(s) remain", blocking.to_string().magenta());
    }
    Ok(())
}
