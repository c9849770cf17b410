//! Status command - statistics and review backlog.

use colored::Colorize;
use floorscan::{ObjectStatus, PlanId};

use super::{status_label, CommandResult, Context, Session};

pub fn run(ctx: &Context, plan: Option<String>, json_output: bool) -> CommandResult {
    let session = Session::open(ctx)?;
    let plan_id = plan.map(PlanId::from);
    let stats = session.engine.statistics(&ctx.tenant, plan_id.as_ref())?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let scope = match plan_id {
        Some(ref plan) => format!("{} / {}", ctx.tenant, plan),
        None => ctx.tenant.to_string(),
    };
    println!("{} {}", "Statistics for".cyan().bold(), scope.white());
    println!();

    // Validation progress bar
    let rate = stats.validation_rate();
    let bar_width = 30;
    let filled = (rate * bar_width as f64).round() as usize;
    let bar: String = "█".repeat(filled) + &"░".repeat(bar_width - filled);
    println!(
        "Validated: {} {}/{} ({:.0}%)",
        bar.cyan(),
        stats.manually_validated.to_string().white().bold(),
        stats.total,
        rate * 100.0
    );
    println!();

    println!("{}", "By status:".yellow().bold());
    for status in ObjectStatus::ALL {
        let count = stats.by_status.get(status);
        if count > 0 {
            println!("  {:<16} {}", status_label(status), count);
        }
    }
    println!();

    println!("{}", "Review:".yellow().bold());
    println!("  Backlog:             {}", stats.review_backlog.to_string().yellow());
    println!("  Needs review:        {}", stats.requires_review);
    println!("  With conflicts:      {}", stats.with_conflicts);
    println!(
        "  Blocking duplicates: {}",
        stats.blocking_duplicates.to_string().magenta()
    );
    if let Some(oldest) = stats.oldest_awaiting_review {
        println!("  Oldest waiting:      {}", oldest.format("%Y-%m-%d %H:%M"));
    }
    println!();

    match stats.average_quality {
        Some(score) => {
            let score_color = if score >= 80.0 {
                format!("{:.1}", score).green()
            } else if score >= 50.0 {
                format!("{:.1}", score).yellow()
            } else {
                format!("{:.1}", score).red()
            };
            println!("Average quality: {}", score_color);
        }
        None => println!("Average quality: {}", "-".dimmed()),
    }
    if let Some(confidence) = stats.average_confidence {
        println!("Average confidence: {:.2}", confidence);
    }

    Ok(())
}
