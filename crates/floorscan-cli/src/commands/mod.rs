//! CLI command implementations.

pub mod history;
pub mod ingest;
pub mod list;
pub mod review;
pub mod scan;
pub mod status;
pub mod sweep;

use std::path::PathBuf;
use std::sync::Arc;

use colored::{ColoredString, Colorize};
use floorscan::{EngineConfig, Floorscan, MemoryStore, ObjectStatus, TenantId};
use tracing::debug;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Global options shared by every command.
pub struct Context {
    pub store: PathBuf,
    pub config: Option<PathBuf>,
    pub tenant: TenantId,
    pub verbose: bool,
}

/// An engine over the snapshot at `ctx.store`, plus the store for saving.
pub struct Session {
    pub engine: Floorscan,
    store: Arc<MemoryStore>,
    path: PathBuf,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match ctx.config {
            Some(ref path) => EngineConfig::from_toml_file(path)?,
            None => EngineConfig::default(),
        };
        let store = Arc::new(
            MemoryStore::load_or_default(&ctx.store)?.with_max_retries(config.max_update_retries),
        );
        debug!(path = %ctx.store.display(), objects = store.len(), "opened store");
        let engine = Floorscan::with_config(config).with_store(store.clone());
        Ok(Self {
            engine,
            store,
            path: ctx.store.clone(),
        })
    }

    /// Write the snapshot back, keeping the previous one in history.
    pub fn save(&self) -> CommandResult {
        self.store.save_with_history(&self.path)?;
        Ok(())
    }
}

pub fn status_label(status: ObjectStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ObjectStatus::Approved => label.green(),
        ObjectStatus::Rejected => label.red(),
        ObjectStatus::Conflicted => label.magenta(),
        ObjectStatus::PendingReview | ObjectStatus::UnderReview => label.yellow(),
        ObjectStatus::Archived => label.dimmed(),
        ObjectStatus::Detected | ObjectStatus::Modified => label.white(),
    }
}
