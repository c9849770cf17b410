//! Sweep command - apply the retention policy.

use chrono::Utc;
use colored::Colorize;

use super::{CommandResult, Context, Session};

pub fn run(ctx: &Context, days: Option<u32>) -> CommandResult {
    let session = Session::open(ctx)?;
    let days_old = days.unwrap_or(session.engine.config().retention_days);
    let swept = session.engine.sweep(Some(days_old), Utc::now())?;

    if swept > 0 {
        session.save()?;
    }

    println!(
        "{} {} object(s) older than {} days",
        "Swept".green().bold(),
        swept,
        days_old
    );
    Ok(())
}
