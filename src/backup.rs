//! Legacy file-store import.
//!
//! Walks a directory tree produced by the old file-based variable store and
//! replays every record through [`KvStore::set`]. Each subdirectory holds
//! JSON files named `<table>_scheme_<n>` containing an object of
//! `storage-key -> { "value": ... }`; the storage key splits at the first
//! underscore into the variable name and its discriminator. Writes are
//! throttled so the import does not monopolize the pool.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::storage::{KvStore, StorageError};

/// Subdirectories that hold bookkeeping, not records.
const SKIP_DIRS: [&str; 3] = ["reference", ".backup", "transaction"];

/// Throttle between record writes.
const WRITE_DELAY: Duration = Duration::from_millis(50);

/// Counters for a completed import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Records written through `set`.
    pub transferred: usize,
    /// Records without a `value` field, counted and left behind.
    pub skipped: usize,
}

/// Replay a legacy file store through the storage API.
pub async fn import(store: &KvStore, directory: &Path) -> Result<ImportStats, StorageError> {
    if !directory.is_dir() {
        return Err(StorageError::Internal(format!(
            "backup directory \"{}\" does not exist",
            directory.display()
        )));
    }

    let mut stats = ImportStats::default();
    let entries = std::fs::read_dir(directory)
        .map_err(|e| StorageError::Internal(format!("failed to read backup directory: {e}")))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| StorageError::Internal(format!("failed to read backup directory: {e}")))?;
        let path = entry.path();
        let dir_name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || SKIP_DIRS.contains(&dir_name.as_str()) {
            continue;
        }
        import_dir(store, &path, &mut stats).await?;
    }

    tracing::info!(
        transferred = stats.transferred,
        skipped = stats.skipped,
        "transfer completed"
    );
    Ok(stats)
}

async fn import_dir(
    store: &KvStore,
    dir: &Path,
    stats: &mut ImportStats,
) -> Result<(), StorageError> {
    let files = std::fs::read_dir(dir)
        .map_err(|e| StorageError::Internal(format!("failed to scan {}: {e}", dir.display())))?;

    for file in files {
        let file = file
            .map_err(|e| StorageError::Internal(format!("failed to scan {}: {e}", dir.display())))?;
        let path = file.path();
        if !path.is_file() {
            continue;
        }

        let file_name = file.file_name().to_string_lossy().to_string();
        let table = file_name
            .split("_scheme_")
            .next()
            .unwrap_or(&file_name)
            .to_string();

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| StorageError::Internal(format!("failed to read {}: {e}", path.display())))?;
        let data: serde_json::Map<String, Value> = serde_json::from_str(&raw)?;
        tracing::info!(file = %file_name, table = %table, keys = data.len(), "transferring table data");

        for (storage_key, entry) in data {
            let Some(value) = entry.get("value") else {
                tracing::warn!(key = %storage_key, "no data found, skipping");
                stats.skipped += 1;
                continue;
            };

            let (name, discriminator) = match storage_key.split_once('_') {
                Some((name, id)) => (name, Some(id)),
                None => (storage_key.as_str(), None),
            };
            store.set(&table, name, discriminator, value).await?;
            stats.transferred += 1;
            tokio::time::sleep(WRITE_DELAY).await;
        }
    }
    Ok(())
}
