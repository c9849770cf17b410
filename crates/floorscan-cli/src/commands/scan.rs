//! Scan command - detect duplicate and overlapping objects on a plan.

use colored::Colorize;
use floorscan::{ConflictType, PlanId};

use super::{CommandResult, Context, Session};

pub fn run(ctx: &Context, plan: String, json_output: bool) -> CommandResult {
    let session = Session::open(ctx)?;
    let plan_id = PlanId::from(plan);

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let job = session.engine.spawn_scan(&ctx.tenant, &plan_id)?;
        if ctx.verbose {
            eprintln!("{} {}", "Started scan job".dimmed(), job.id());
        }
        job.wait().await
    })?;

    if report.objects_updated > 0 {
        session.save()?;
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} ({} objects, {} pairs)",
        "Scanned plan".cyan().bold(),
        plan_id.to_string().white().bold(),
        report.objects_scanned,
        report.pairs_compared
    );
    println!(
        "  Duplicates: {}",
        report.count(ConflictType::Duplicate).to_string().magenta()
    );
    println!(
        "  Overlaps:   {}",
        report.count(ConflictType::Overlap).to_string().yellow()
    );
    println!("  Updated:    {}", report.objects_updated);

    if !report.integrity_warnings.is_empty() {
        println!();
        println!(
            "{} {} pair(s) skipped for bad data",
            "Warning:".red().bold(),
            report.integrity_warnings.len()
        );
        for warning in report.integrity_warnings.iter().take(10) {
            println!("  {}: {}", warning.offending_id, warning.message);
        }
    }

    if ctx.verbose {
        println!();
        for conflict in &report.conflicts {
            let marker = if conflict.auto_resolvable { " (auto)" } else { "" };
            println!(
                "  {:<9} {} <> {}{}",
                conflict.conflict_type.label(),
                conflict.object1_id,
                conflict.object2_id,
                marker.dimmed()
            );
        }
    }

    Ok(())
}
