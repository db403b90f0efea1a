//! The public operation surface of the store.
//!
//! [`KvStore`] owns the pool, the table registry, the event bus, and the
//! per-table declared defaults. Every operation guarantees table existence
//! first, then queries, then routes any backend fault through the error
//! policy: the fault is emitted on the `error` event and, unless the store
//! was built with `throw: true`, swallowed in favor of a neutral result so
//! dependent scripting logic can continue.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, EnumString};
use tokio::sync::{RwLock, broadcast};

use crate::storage::StorageError;
use crate::storage::codec::{encode_key, encode_value};
use crate::storage::events::{EventBus, StorageEvent};
use crate::storage::pool::DbPool;
use crate::storage::registry::TableRegistry;

/// Default page size for [`KvStore::all`].
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Variable names owned by the runtime. `get` for these returns only what
/// is stored, never a declared default.
const RUNTIME_KEYS: [&str; 3] = ["cooldown", "timeout", "ticket"];

/// Caller-supplied predicate over records, applied after retrieval.
pub type RecordFilter<'a> = &'a (dyn Fn(&Record) -> bool + Send + Sync);

/// A stored (key, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The storage key (variable name plus optional discriminator).
    pub key: String,
    /// The stored text value.
    pub value: String,
}

/// Sort direction for value-ordered scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Key-value storage facade.
///
/// Cheap to clone; clones share the pool, the event bus, and the declared
/// defaults.
#[derive(Clone)]
pub struct KvStore {
    pool: DbPool,
    registry: TableRegistry,
    bus: EventBus,
    defaults: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    throw_on_error: bool,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("tables", &self.registry.tables())
            .finish_non_exhaustive()
    }
}

impl KvStore {
    pub(crate) fn new(
        pool: DbPool,
        registry: TableRegistry,
        bus: EventBus,
        throw_on_error: bool,
    ) -> Self {
        Self {
            pool,
            registry,
            bus,
            defaults: Arc::new(RwLock::new(HashMap::new())),
            throw_on_error,
        }
    }

    /// The configured logical tables, reserved table included.
    pub fn tables(&self) -> &[String] {
        self.registry.tables()
    }

    /// The first configured table, used as the default namespace.
    pub fn default_table(&self) -> &str {
        &self.registry.tables()[0]
    }

    /// Subscribe to the store's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.bus.subscribe()
    }

    /// Register declared defaults for variables in `table`.
    ///
    /// The default is returned by [`Self::get`] when no row exists for the
    /// storage key.
    pub async fn define_variables<I>(&self, table: &str, vars: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if !self.registry.is_configured(table) {
            let err = StorageError::Config(format!(
                "table \"{table}\" is not defined in options"
            ));
            return self.absorb("define_variables", err, ());
        }
        let mut defaults = self.defaults.write().await;
        let entry = defaults.entry(table.to_string()).or_default();
        for (name, value) in vars {
            entry.insert(name, encode_value(&value).into_text());
        }
        Ok(())
    }

    /// Look up a variable.
    ///
    /// Falls back to the declared default when the storage key is absent,
    /// except for runtime-internal names which bypass default substitution.
    /// Returns `None` when neither a row nor a default exists.
    pub async fn get(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
    ) -> Result<Option<Record>, StorageError> {
        match self.get_inner(table, name, discriminator).await {
            Ok(record) => Ok(record),
            Err(err) => self.absorb("get", err, None),
        }
    }

    async fn get_inner(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
    ) -> Result<Option<Record>, StorageError> {
        self.registry.provision(table).await?;
        let key = encode_key(name, discriminator);
        self.bus
            .emit(StorageEvent::Debug(format!("get({table}, {key})")));

        let sql = format!("SELECT \"key\", \"value\" FROM \"{table}\" WHERE \"key\" = ?");
        let row: Option<(String, String)> = sqlx::query_as(&sql)
            .bind(&key)
            .fetch_optional(self.pool.executor())
            .await?;

        if let Some((key, value)) = row {
            return Ok(Some(Record { key, value }));
        }
        if RUNTIME_KEYS.contains(&name) {
            return Ok(None);
        }
        let defaults = self.defaults.read().await;
        Ok(defaults
            .get(table)
            .and_then(|vars| vars.get(name))
            .map(|default| Record {
                key,
                value: default.clone(),
            }))
    }

    /// Upsert a variable: exactly one row per storage key after the call.
    pub async fn set(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
        value: &Value,
    ) -> Result<(), StorageError> {
        match self.set_inner(table, name, discriminator, value).await {
            Ok(()) => Ok(()),
            Err(err) => self.absorb("set", err, ()),
        }
    }

    async fn set_inner(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
        value: &Value,
    ) -> Result<(), StorageError> {
        self.registry.provision(table).await?;
        let key = encode_key(name, discriminator);
        let text = encode_value(value).into_text();
        self.bus
            .emit(StorageEvent::Debug(format!("set({table}, {key}, {text})")));

        let sql = format!(
            "INSERT INTO \"{table}\" (\"key\", \"value\") VALUES (?, ?) \
             ON CONFLICT(\"key\") DO UPDATE SET \"value\" = excluded.\"value\""
        );
        sqlx::query(&sql)
            .bind(&key)
            .bind(&text)
            .execute(self.pool.executor())
            .await?;
        Ok(())
    }

    /// Remove the row for the computed storage key; no-op when absent.
    pub async fn delete(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
    ) -> Result<(), StorageError> {
        match self.delete_inner(table, name, discriminator).await {
            Ok(()) => Ok(()),
            Err(err) => self.absorb("delete", err, ()),
        }
    }

    async fn delete_inner(
        &self,
        table: &str,
        name: &str,
        discriminator: Option<&str>,
    ) -> Result<(), StorageError> {
        self.registry.provision(table).await?;
        let key = encode_key(name, discriminator);
        self.bus
            .emit(StorageEvent::Debug(format!("delete({table}, {key})")));

        let sql = format!("DELETE FROM \"{table}\" WHERE \"key\" = ?");
        sqlx::query(&sql)
            .bind(&key)
            .execute(self.pool.executor())
            .await?;
        Ok(())
    }

    /// Delete every record matching `filter` (all records when `None`) in
    /// one batched statement; no-op when nothing matches.
    pub async fn delete_many(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
    ) -> Result<(), StorageError> {
        match self.delete_many_inner(table, filter).await {
            Ok(()) => Ok(()),
            Err(err) => self.absorb("delete_many", err, ()),
        }
    }

    async fn delete_many_inner(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
    ) -> Result<(), StorageError> {
        self.registry.provision(table).await?;
        self.bus
            .emit(StorageEvent::Debug(format!("delete_many({table})")));

        let rows = self.fetch_all_rows(table).await?;
        let keys: Vec<String> = rows
            .into_iter()
            .filter(|record| filter.is_none_or(|f| f(record)))
            .map(|record| record.key)
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; keys.len()].join(",");
        let sql = format!("DELETE FROM \"{table}\" WHERE \"key\" IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for key in &keys {
            query = query.bind(key);
        }
        query.execute(self.pool.executor()).await?;
        Ok(())
    }

    /// Delete one raw storage key, or drop the whole physical relation when
    /// no variable is given.
    pub async fn drop(&self, table: &str, variable: Option<&str>) -> Result<(), StorageError> {
        match self.drop_inner(table, variable).await {
            Ok(()) => Ok(()),
            Err(err) => self.absorb("drop", err, ()),
        }
    }

    async fn drop_inner(&self, table: &str, variable: Option<&str>) -> Result<(), StorageError> {
        self.registry.provision(table).await?;

        if let Some(variable) = variable {
            self.bus
                .emit(StorageEvent::Debug(format!("drop({table}, {variable})")));
            let sql = format!("DELETE FROM \"{table}\" WHERE \"key\" = ?");
            sqlx::query(&sql)
                .bind(variable)
                .execute(self.pool.executor())
                .await?;
            return Ok(());
        }

        self.bus.emit(StorageEvent::Debug(format!("drop({table})")));
        let sql = format!("DROP TABLE IF EXISTS \"{table}\"");
        sqlx::query(&sql).execute(self.pool.executor()).await?;
        Ok(())
    }

    /// Look up one record by its raw storage key, without default
    /// substitution.
    pub async fn find_one(&self, table: &str, key: &str) -> Result<Option<Record>, StorageError> {
        match self.find_one_inner(table, key).await {
            Ok(record) => Ok(record),
            Err(err) => self.absorb("find_one", err, None),
        }
    }

    async fn find_one_inner(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<Record>, StorageError> {
        self.registry.provision(table).await?;
        self.bus
            .emit(StorageEvent::Debug(format!("find_one({table}, {key})")));

        let sql = format!("SELECT \"key\", \"value\" FROM \"{table}\" WHERE \"key\" = ?");
        let row: Option<(String, String)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(self.pool.executor())
            .await?;
        Ok(row.map(|(key, value)| Record { key, value }))
    }

    /// Scan the table, apply `filter` client-side, truncate to `limit`.
    pub async fn find_many(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StorageError> {
        match self.find_many_inner(table, filter, limit).await {
            Ok(records) => Ok(records),
            Err(err) => self.absorb("find_many", err, Vec::new()),
        }
    }

    async fn find_many_inner(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StorageError> {
        self.registry.provision(table).await?;
        self.bus
            .emit(StorageEvent::Debug(format!("find_many({table})")));

        let mut records: Vec<Record> = self
            .fetch_all_rows(table)
            .await?
            .into_iter()
            .filter(|record| filter.is_none_or(|f| f(record)))
            .collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    /// Retrieve every record ordered globally by value (numeric
    /// comparison), apply `filter`, then truncate to `page_size` (default
    /// 100).
    ///
    /// Ordering is established before the predicate and the truncation, so
    /// leaderboard callers get a stable global ranking; slicing the prefix
    /// into pages is the caller's arithmetic.
    pub async fn all(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
        page_size: Option<usize>,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Record>, StorageError> {
        match self.all_inner(table, filter, page_size, sort).await {
            Ok(records) => Ok(records),
            Err(err) => self.absorb("all", err, Vec::new()),
        }
    }

    async fn all_inner(
        &self,
        table: &str,
        filter: Option<RecordFilter<'_>>,
        page_size: Option<usize>,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Record>, StorageError> {
        self.registry.provision(table).await?;
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let sort = sort.unwrap_or_default();
        self.bus.emit(StorageEvent::Debug(format!(
            "all({table}, {page_size}, {})",
            sort.as_ref()
        )));

        let sql = format!(
            "SELECT \"key\", \"value\" FROM \"{table}\" \
             ORDER BY CAST(\"value\" AS NUMERIC) {dir}, \"value\" {dir}",
            dir = sort.as_sql()
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .fetch_all(self.pool.executor())
            .await?;

        let mut records: Vec<Record> = rows
            .into_iter()
            .map(|(key, value)| Record { key, value })
            .filter(|record| filter.is_none_or(|f| f(record)))
            .collect();
        records.truncate(page_size);
        Ok(records)
    }

    /// Round-trip latency in milliseconds, or -1 when the probe fails.
    pub async fn ping(&self) -> Result<i64, StorageError> {
        self.bus.emit(StorageEvent::Debug("ping()".to_string()));
        match self.pool.ping().await {
            Ok(latency) => Ok(latency),
            Err(err) => self.absorb("ping", err, -1),
        }
    }

    /// Close the underlying pool and emit `disconnect`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_all_rows(&self, table: &str) -> Result<Vec<Record>, StorageError> {
        let sql = format!("SELECT \"key\", \"value\" FROM \"{table}\"");
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .fetch_all(self.pool.executor())
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| Record { key, value })
            .collect())
    }

    /// Route a steady-state fault through the error policy: emit `error`,
    /// then swallow (returning `neutral`) or re-raise per the `throw`
    /// option.
    fn absorb<T>(&self, op: &str, err: StorageError, neutral: T) -> Result<T, StorageError> {
        self.bus
            .emit(StorageEvent::Error(format!("{op}: {err}")));
        if self.throw_on_error {
            Err(err)
        } else {
            Ok(neutral)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!(SortOrder::from_str("asc").unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::from_str("DESC").unwrap(), SortOrder::Desc);
        assert_eq!(SortOrder::default(), SortOrder::Asc);
        assert_eq!(SortOrder::Desc.as_sql(), "DESC");
    }

    #[test]
    fn test_runtime_keys_cover_cooldown() {
        assert!(RUNTIME_KEYS.contains(&"cooldown"));
    }
}
