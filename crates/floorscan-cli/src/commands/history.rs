//! History command - print an object's audit trail.

use colored::Colorize;
use floorscan::ObjectId;

use super::{status_label, CommandResult, Context, Session};

pub fn run(ctx: &Context, id: String, json_output: bool) -> CommandResult {
    let session = Session::open(ctx)?;
    let object = session.engine.get(&ctx.tenant, &ObjectId::from(id))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&object.modification_history)?);
        return Ok(());
    }

    println!(
        "{} {} ({}/{}, {})",
        "History of".cyan().bold(),
        object.id.to_string().white().bold(),
        object.category,
        object.object_type,
        status_label(object.status)
    );
    if object.is_deleted {
        println!("  {}", "soft-deleted".red());
    }
    println!();

    for entry in &object.modification_history {
        println!(
            "{}  {:<20} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            entry.action.yellow(),
            entry.actor
        );
        for change in &entry.changes {
            println!("    {}: {} -> {}", change.field, change.before, change.after);
        }
    }
    Ok(())
}
