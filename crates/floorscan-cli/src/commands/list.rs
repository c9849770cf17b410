//! List command - filtered, paginated object listing.

use colored::Colorize;
use floorscan::{ObjectQuery, ObjectStatus};

use super::{status_label, CommandResult, Context, Session};

pub struct Filters {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub needs_review: bool,
    pub search: Option<String>,
    pub include_deleted: bool,
    pub page: usize,
    pub per_page: Option<usize>,
}

impl Filters {
    fn into_query(self) -> Result<ObjectQuery, Box<dyn std::error::Error>> {
        let mut query = ObjectQuery::new();
        query.plan_id = self.plan.map(Into::into);
        if let Some(status) = self.status {
            query.status = Some(status.parse::<ObjectStatus>()?);
        }
        if self.needs_review {
            query.requires_review = Some(true);
        }
        query.search = self.search;
        query.include_deleted = self.include_deleted;
        query.page = Some(self.page);
        query.per_page = self.per_page;
        Ok(query)
    }
}

pub fn run(ctx: &Context, filters: Filters, json_output: bool) -> CommandResult {
    let session = Session::open(ctx)?;
    let query = filters.into_query()?;
    let page = session.engine.query(&ctx.tenant, &query)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("{}", "No objects match.".dimmed());
        return Ok(());
    }

    for object in &page.items {
        let confidence = object
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "-".to_string());
        let review = if object.requires_review {
            "review".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "{}  {:<10} {:<24} {:<16} {:>5}  {}",
            object.id.to_string().dimmed(),
            object.plan_id,
            format!("{}/{}", object.category, object.object_type),
            status_label(object.status),
            confidence,
            review
        );
        if !object.conflicts.is_empty() {
            let open = object.conflicts.iter().filter(|c| !c.resolved).count();
            println!(
                "    {} conflict(s), {} unresolved",
                object.conflicts.len(),
                open.to_string().magenta()
            );
        }
    }

    println!();
    println!(
        "Page {}/{} ({} total)",
        page.page,
        page.total_pages().max(1),
        page.total
    );
    Ok(())
}
