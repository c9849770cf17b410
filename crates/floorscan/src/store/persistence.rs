//! Persistence for the memory store - save/load JSON snapshots.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{FloorscanError, Result};
use crate::object::InfraObject;

use super::memory::MemoryStore;
use super::ObjectStore;

/// Current version of the snapshot format.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// On-disk form of a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub snapshot_version: String,
    pub saved_at: DateTime<Utc>,
    pub objects: Vec<InfraObject>,
}

impl MemoryStore {
    /// Save every record to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    FloorscanError::Persistence(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let snapshot = StoreSnapshot {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            objects: self.snapshot()?,
        };

        // Stage next to the target so the final rename stays on one filesystem.
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
            FloorscanError::Persistence(format!(
                "Failed to create temporary file in '{}': {}",
                dir.display(),
                e
            ))
        })?;

        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &snapshot).map_err(|e| {
                FloorscanError::Persistence(format!("Failed to serialize store snapshot: {}", e))
            })?;
            writer.flush().map_err(|e| {
                FloorscanError::Persistence(format!("Failed to write store snapshot: {}", e))
            })?;
        }

        staged.persist(path).map_err(|e| {
            FloorscanError::Persistence(format!(
                "Failed to replace '{}': {}",
                path.display(),
                e.error
            ))
        })?;

        debug!(
            path = %path.display(),
            objects = snapshot.objects.len(),
            "saved store snapshot"
        );
        Ok(())
    }

    /// Load a store from a JSON snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = read_snapshot(path.as_ref())?;
        Ok(Self::from_objects(snapshot.objects))
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save with version history.
    ///
    /// Copies the existing file into a sibling `.history` directory, named by
    /// the time it was saved, before overwriting it.
    ///
    /// ```text
    /// data/
    /// ├── site.floorscan.json
    /// └── site.floorscan.history/
    ///     └── 2026-10-01T09-30-00.json
    /// ```
    pub fn save_with_history(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if path.exists() {
            save_to_history(path)?;
        }

        self.save(path)
    }

    /// List historical snapshots, newest first.
    pub fn list_history(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let history_dir = history_directory(path.as_ref());

        if !history_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(&history_dir)
            .map_err(|e| {
                FloorscanError::Persistence(format!(
                    "Failed to read history directory '{}': {}",
                    history_dir.display(),
                    e
                ))
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();

        entries.sort_by(|a, b| b.cmp(a));

        Ok(entries)
    }

    /// Load a specific historical snapshot (0 = most recent backup).
    pub fn load_history(path: impl AsRef<Path>, index: usize) -> Result<Self> {
        let history = Self::list_history(&path)?;

        let history_path = history.get(index).ok_or_else(|| {
            FloorscanError::Persistence(format!(
                "History version {} not found (only {} versions available)",
                index,
                history.len()
            ))
        })?;

        Self::load(history_path)
    }
}

fn read_snapshot(path: &Path) -> Result<StoreSnapshot> {
    let file = File::open(path).map_err(|e| {
        FloorscanError::Persistence(format!("Failed to open file '{}': {}", path.display(), e))
    })?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        FloorscanError::Persistence(format!(
            "Failed to parse store snapshot '{}': {}",
            path.display(),
            e
        ))
    })
}

fn save_to_history(path: &Path) -> Result<()> {
    let history_dir = history_directory(path);

    if !history_dir.exists() {
        fs::create_dir_all(&history_dir).map_err(|e| {
            FloorscanError::Persistence(format!(
                "Failed to create history directory '{}': {}",
                history_dir.display(),
                e
            ))
        })?;
    }

    let existing = read_snapshot(path)?;
    let timestamp = existing.saved_at.format("%Y-%m-%dT%H-%M-%S%.3f").to_string();
    let history_file = history_dir.join(format!("{}.json", timestamp));

    fs::copy(path, &history_file).map_err(|e| {
        FloorscanError::Persistence(format!(
            "Failed to copy '{}' to history: {}",
            path.display(),
            e
        ))
    })?;
    Ok(())
}

/// Get the history directory for a snapshot file.
pub fn history_directory(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let parent = path.parent().unwrap_or(Path::new("."));

    parent.join(format!("{}.history", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::test_support::sample_object;
    use crate::object::{ObjectId, TenantId};
    use crate::store::Audit;
    use tempfile::TempDir;

    #[test]
    fn test_history_directory() {
        let path = Path::new("data/site.floorscan.json");
        assert_eq!(
            history_directory(path).to_string_lossy(),
            "data/site.floorscan.history"
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        store
            .insert(sample_object("a"), &Audit::new("user:a", "create"))
            .unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        let obj = loaded.get(&TenantId::from("t1"), &ObjectId::from("a")).unwrap();
        assert_eq!(obj.revision, 1);
        assert_eq!(obj.modification_history.len(), 1);
    }

    #[test]
    fn test_save_with_history_keeps_previous_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        store.save_with_history(&path).unwrap();
        assert!(MemoryStore::list_history(&path).unwrap().is_empty());

        store
            .insert(sample_object("a"), &Audit::new("user:a", "create"))
            .unwrap();
        store.save_with_history(&path).unwrap();

        let history = MemoryStore::list_history(&path).unwrap();
        assert_eq!(history.len(), 1);
        assert!(MemoryStore::load_history(&path, 0).unwrap().is_empty());
        assert_eq!(MemoryStore::load(&path).unwrap().len(), 1);
        assert!(MemoryStore::load_history(&path, 3).is_err());
    }

    #[test]
    fn test_overwrite_replaces_snapshot_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        store.save(&path).unwrap();
        store
            .insert(sample_object("a"), &Audit::new("user:a", "create"))
            .unwrap();
        store.save(&path).unwrap();

        assert_eq!(MemoryStore::load(&path).unwrap().len(), 1);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("store.json")]);
    }

    #[test]
    fn test_failed_save_leaves_directory_untouched() {
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("store.json");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep.txt"), "x").unwrap();

        let err = MemoryStore::new().save(&blocked).unwrap_err();
        assert!(matches!(err, FloorscanError::Persistence(_)));

        assert_eq!(fs::read_to_string(blocked.join("keep.txt")).unwrap(), "x");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::load_or_default(dir.path().join("missing.json")).unwrap();
        assert!(store.is_empty());
    }
}
