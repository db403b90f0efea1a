//! Table registry: existence checks and lazy provisioning.
//!
//! Every logical table the store is configured with, plus one reserved
//! table for runtime-owned values (cooldowns and similar), must exist
//! before any operation against it is served. Existence is always
//! re-verified against the backend catalog rather than a local cache, so a
//! table dropped by an external actor is transparently re-provisioned.

use crate::storage::StorageError;
use crate::storage::events::{EventBus, StorageEvent};
use crate::storage::pool::DbPool;

/// Reserved table for runtime-internal bookkeeping. Forbidden as a
/// caller-supplied logical table name.
pub const RESERVED_TABLE: &str = "__varstore_internal__";

/// Check that a table name is a safe SQL identifier.
///
/// Table names are interpolated into DDL/DML statements, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Tracks which logical tables the store owns and provisions them lazily.
#[derive(Clone)]
pub struct TableRegistry {
    pool: DbPool,
    tables: Vec<String>,
    bus: EventBus,
}

impl std::fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistry")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

impl TableRegistry {
    /// Create a registry over the configured table set (reserved table
    /// included).
    pub fn new(pool: DbPool, tables: Vec<String>, bus: EventBus) -> Self {
        Self { pool, tables, bus }
    }

    /// The configured logical tables.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Whether `table` is among the configured logical tables.
    pub fn is_configured(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Query the backend catalog for the physical relation.
    pub async fn exists(&self, table: &str) -> Result<bool, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(self.pool.executor())
                .await?;
        Ok(count > 0)
    }

    /// Idempotently create `table` with the fixed two-column schema.
    ///
    /// Fails with a configuration error when `table` is not among the
    /// configured logical tables; no-op when the table already exists.
    /// Concurrent provisioning of the same table is harmless because the
    /// statement is create-if-absent.
    pub async fn provision(&self, table: &str) -> Result<(), StorageError> {
        if !self.is_configured(table) {
            return Err(StorageError::Config(format!(
                "table \"{table}\" is not defined in options"
            )));
        }
        if self.exists(table).await? {
            return Ok(());
        }

        self.bus
            .emit(StorageEvent::Debug(format!("provisioning table {table}")));
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
             \"key\" VARCHAR(255) NOT NULL PRIMARY KEY, \
             \"value\" TEXT NOT NULL)"
        );
        sqlx::query(&ddl).execute(self.pool.executor()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn test_registry(dir: &tempfile::TempDir, tables: &[&str]) -> TableRegistry {
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("reg.db").display());
        let bus = EventBus::default();
        let pool = DbPool::connect(&url, 2, bus.clone()).await.unwrap();
        TableRegistry::new(pool, tables.iter().map(|t| t.to_string()).collect(), bus)
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("main"));
        assert!(is_valid_table_name("_vars_2"));
        assert!(is_valid_table_name(RESERVED_TABLE));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("2fast"));
        assert!(!is_valid_table_name("bad-name"));
        assert!(!is_valid_table_name("drop table; --"));
    }

    #[tokio::test]
    async fn test_provision_creates_table_once() {
        let dir = tempdir().unwrap();
        let registry = test_registry(&dir, &["main"]).await;

        assert!(!registry.exists("main").await.unwrap());
        registry.provision("main").await.unwrap();
        assert!(registry.exists("main").await.unwrap());

        // Second call is a no-op.
        registry.provision("main").await.unwrap();
        assert!(registry.exists("main").await.unwrap());
    }

    #[tokio::test]
    async fn test_provision_rejects_unconfigured_table() {
        let dir = tempdir().unwrap();
        let registry = test_registry(&dir, &["main"]).await;

        let err = registry.provision("other").await.unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
