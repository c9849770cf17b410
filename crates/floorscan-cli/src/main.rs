//! Floorscan CLI - manage facility objects on floor plans.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = commands::Context {
        store: cli.store,
        config: cli.config,
        tenant: cli.tenant.into(),
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Ingest { file, manual, user } => commands::ingest::run(&ctx, file, manual, &user),

        Commands::List {
            plan,
            status,
            needs_review,
            search,
            include_deleted,
            page,
            per_page,
            json,
        } => commands::list::run(
            &ctx,
            commands::list::Filters {
                plan,
                status,
                needs_review,
                search,
                include_deleted,
                page,
                per_page,
            },
            json,
        ),

        Commands::Scan { plan, json } => commands::scan::run(&ctx, plan, json),

        Commands::Review {
            id,
            action,
            reason,
            user,
        } => commands::review::run(&ctx, id, action, reason, user),

        Commands::Resolve {
            id,
            other,
            conflict_type,
            user,
        } => commands::review::resolve(&ctx, id, other, conflict_type.into(), user),

        Commands::Status { plan, json } => commands::status::run(&ctx, plan, json),

        Commands::History { id, json } => commands::history::run(&ctx, id, json),

        Commands::Sweep { days } => commands::sweep::run(&ctx, days),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "floorscan=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
