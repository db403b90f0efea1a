//! Store options, validation, and connection bootstrap.
//!
//! Construction validates the options (fatal on error), connects the pool,
//! provisions every configured table plus the reserved one, emits
//! `connect`, and optionally replays a legacy file-based store through the
//! import collaborator.

use serde::Deserialize;
use std::path::PathBuf;

use crate::backup;
use crate::storage::StorageError;
use crate::storage::events::{EventBus, StorageEvent};
use crate::storage::facade::KvStore;
use crate::storage::pool::{DbPool, DEFAULT_POOL_SIZE};
use crate::storage::registry::{TableRegistry, RESERVED_TABLE, is_valid_table_name};

/// Default capacity of the event broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

/// Legacy file-store import settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupOptions {
    /// Run the import after connecting.
    pub enable: bool,
    /// Root directory of the legacy store.
    pub directory: PathBuf,
}

/// Recognized store construction options.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreOptions {
    /// Logical table names (required, non-empty; the reserved internal
    /// table name is forbidden).
    pub tables: Vec<String>,

    /// Backend connection string.
    #[serde(alias = "uri")]
    pub url: String,

    /// Enable verbose event logging.
    #[serde(default)]
    pub debug: bool,

    /// Re-raise operation failures instead of swallowing them.
    #[serde(default, alias = "throw")]
    pub throw_on_error: bool,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Legacy file-store import, run post-connect.
    #[serde(default)]
    pub backup: Option<BackupOptions>,
}

impl StoreOptions {
    /// Options with defaults for everything but tables and url.
    pub fn new<I, S>(tables: I, url: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            url: url.into(),
            debug: false,
            throw_on_error: false,
            pool_size: DEFAULT_POOL_SIZE,
            backup: None,
        }
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.tables.is_empty() {
            return Err(StorageError::Config(
                "no variable tables specified in options; provide at least one table".to_string(),
            ));
        }
        if self.tables.iter().any(|t| t == RESERVED_TABLE) {
            return Err(StorageError::Config(format!(
                "\"{RESERVED_TABLE}\" is reserved as a table name and cannot be used"
            )));
        }
        for table in &self.tables {
            if !is_valid_table_name(table) {
                return Err(StorageError::Config(format!(
                    "invalid table name \"{table}\""
                )));
            }
        }
        if self.url.is_empty() {
            return Err(StorageError::Config(
                "missing database url in options".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(StorageError::Config(
                "pool_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a connected [`KvStore`].
pub struct StoreBuilder {
    options: StoreOptions,
    event_capacity: usize,
}

impl StoreBuilder {
    /// Create a builder from options.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Capacity of the event broadcast channel.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate options, connect, and provision all tables.
    ///
    /// Connection and provisioning faults are fatal here; the caller
    /// decides whether to terminate the process.
    pub async fn connect(self) -> Result<KvStore, StorageError> {
        let options = self.options;
        options.validate()?;

        let bus = EventBus::new(self.event_capacity, options.debug);
        bus.emit(StorageEvent::Debug("connecting database...".to_string()));

        let pool = DbPool::connect(&options.url, options.pool_size, bus.clone())
            .await
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        let mut tables = options.tables.clone();
        tables.push(RESERVED_TABLE.to_string());
        let registry = TableRegistry::new(pool.clone(), tables, bus.clone());
        for table in registry.tables().to_vec() {
            registry
                .provision(&table)
                .await
                .map_err(|e| StorageError::Connect(e.to_string()))?;
        }

        let store = KvStore::new(pool, registry, bus.clone(), options.throw_on_error);
        bus.emit(StorageEvent::Connect);

        let latency = store.ping().await?;
        tracing::info!(latency_ms = latency, "connected to database");

        if let Some(backup) = &options.backup {
            if backup.enable {
                match backup::import(&store, &backup.directory).await {
                    Ok(stats) => tracing::info!(
                        transferred = stats.transferred,
                        skipped = stats.skipped,
                        "legacy import complete"
                    ),
                    Err(e) => tracing::warn!(error = %e, "legacy import failed"),
                }
            }
        }

        Ok(store)
    }
}

impl KvStore {
    /// Construct and connect a store from options.
    pub async fn connect(options: StoreOptions) -> Result<Self, StorageError> {
        StoreBuilder::new(options).connect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite:{}?mode=rwc", dir.path().join("store.db").display())
    }

    #[tokio::test]
    async fn test_connect_provisions_all_tables() {
        let dir = tempdir().unwrap();
        let store = KvStore::connect(StoreOptions::new(["main", "extra"], test_url(&dir)))
            .await
            .unwrap();
        assert_eq!(store.tables(), ["main", "extra", RESERVED_TABLE]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_empty_tables_rejected() {
        let options = StoreOptions::new(Vec::<String>::new(), "sqlite::memory:");
        let err = KvStore::connect(options).await.unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[tokio::test]
    async fn test_reserved_table_rejected() {
        let options = StoreOptions::new(["main", RESERVED_TABLE], "sqlite::memory:");
        let err = KvStore::connect(options).await.unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected() {
        let options = StoreOptions::new(["bad-name"], "sqlite::memory:");
        let err = KvStore::connect(options).await.unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_options_deserialize_aliases() {
        let options: StoreOptions = serde_json::from_value(serde_json::json!({
            "tables": ["main"],
            "uri": "sqlite::memory:",
            "throw": true,
        }))
        .unwrap();
        assert_eq!(options.url, "sqlite::memory:");
        assert!(options.throw_on_error);
        assert!(!options.debug);
        assert_eq!(options.pool_size, DEFAULT_POOL_SIZE);
    }
}
