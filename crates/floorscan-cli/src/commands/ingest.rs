//! Ingest command - load detections or manual objects into the store.

use std::fs;
use std::path::PathBuf;

use colored::Colorize;
use floorscan::{Detection, InfraObject, NewObject};

use super::{status_label, CommandResult, Context, Session};

pub fn run(ctx: &Context, file: PathBuf, manual: bool, user: &str) -> CommandResult {
    if !file.exists() {
        return Err(format!("Payload file not found: {}", file.display()).into());
    }
    let text = fs::read_to_string(&file)?;
    let session = Session::open(ctx)?;

    let created: Vec<InfraObject> = if manual {
        let objects: Vec<NewObject> = serde_json::from_str(&text)?;
        objects
            .into_iter()
            .map(|new| session.engine.create(&ctx.tenant, user, new))
            .collect::<Result<_, _>>()?
    } else {
        let detections: Vec<Detection> = serde_json::from_str(&text)?;
        session.engine.ingest_all(&ctx.tenant, user, detections)?
    };

    session.save()?;

    let needs_review = created.iter().filter(|o| o.requires_review).count();
    println!(
        "{} {} object(s) into tenant {}",
        "Ingested".green().bold(),
        created.len(),
        ctx.tenant.to_string().white().bold()
    );
    if ctx.verbose {
        for object in &created {
            println!(
                "  {}  {}/{}  {}",
                object.id.to_string().dimmed(),
                object.category,
                object.object_type,
                status_label(object.status)
            );
        }
    }
    if needs_review > 0 {
        println!("  {} need review", needs_review.to_string().yellow());
    }

    Ok(())
}
