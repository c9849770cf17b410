//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Floorscan: lifecycle engine for facility objects on floor plans
#[derive(Parser)]
#[command(name = "floorscan")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store snapshot file
    #[arg(long, global = true, env = "FLOORSCAN_STORE", default_value = "floorscan.json")]
    pub store: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "FLOORSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tenant to operate on
    #[arg(long, global = true, env = "FLOORSCAN_TENANT", default_value = "default")]
    pub tenant: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest AI detections (or manual objects) from a JSON array
    Ingest {
        /// Path to the JSON payload
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Treat the payload as manually created objects
        #[arg(long)]
        manual: bool,

        /// Actor recorded in the audit history
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// List objects
    List {
        /// Only objects on this plan
        #[arg(short, long)]
        plan: Option<String>,

        /// Only objects with this status (e.g. pending_review)
        #[arg(short, long)]
        status: Option<String>,

        /// Only objects that need review
        #[arg(long)]
        needs_review: bool,

        /// Search name and description
        #[arg(long)]
        search: Option<String>,

        /// Include soft-deleted objects
        #[arg(long)]
        include_deleted: bool,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: usize,

        /// Results per page
        #[arg(long)]
        per_page: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect duplicates and overlaps on a plan
    Scan {
        /// Plan to scan
        #[arg(value_name = "PLAN")]
        plan: String,

        /// Output the scan report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a validator action to an object
    Review {
        /// Object id
        #[arg(value_name = "ID")]
        id: String,

        /// Action to apply
        #[arg(short, long, value_enum)]
        action: ReviewAction,

        /// Reason recorded with a rejection
        #[arg(long)]
        reason: Option<String>,

        /// Validator name for the decision
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Mark a conflict between two objects as resolved
    Resolve {
        /// Object id
        #[arg(value_name = "ID")]
        id: String,

        /// The other object in the conflict
        #[arg(value_name = "OTHER_ID")]
        other: String,

        /// Conflict type
        #[arg(short = 't', long = "type", value_enum, default_value = "duplicate")]
        conflict_type: ConflictKind,

        /// Validator name for the decision
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Show statistics and review backlog
    Status {
        /// Restrict to one plan
        #[arg(short, long)]
        plan: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the modification history of an object
    History {
        /// Object id
        #[arg(value_name = "ID")]
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Soft-delete old rejected and archived objects
    Sweep {
        /// Age threshold in days (default from config)
        #[arg(long)]
        days: Option<u32>,
    },
}

/// Validator actions available from the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReviewAction {
    Approve,
    Reject,
    Request,
    Start,
    Archive,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConflictKind {
    Duplicate,
    Overlap,
}

impl From<ConflictKind> for floorscan::ConflictType {
    fn from(kind: ConflictKind) -> Self {
        match kind {
            ConflictKind::Duplicate => floorscan::ConflictType::Duplicate,
            ConflictKind::Overlap => floorscan::ConflictType::Overlap,
        }
    }
}
