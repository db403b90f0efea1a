//! Connection pool wrapper around sqlx.
//!
//! Owns the pooled connection source for the store, re-emits the pool's
//! lifecycle as [`StorageEvent`]s, and exposes a latency probe.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool as SqlxPool, SqlitePoolOptions,
    SqliteSynchronous,
};

use crate::storage::StorageError;
use crate::storage::events::{EventBus, StorageEvent};

/// Default maximum connections in the pool.
pub const DEFAULT_POOL_SIZE: u32 = 5;

/// Default connection acquire timeout.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite connection pool wrapper.
///
/// Wraps sqlx's pool with WAL mode and create-if-missing defaults, and
/// forwards `connection`/`acquire`/`release` notifications to the event bus
/// so operators can observe pool pressure.
#[derive(Clone)]
pub struct DbPool {
    inner: SqlxPool,
    bus: EventBus,
    max_connections: u32,
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbPool").finish_non_exhaustive()
    }
}

impl DbPool {
    /// Connect to the database.
    ///
    /// # Arguments
    ///
    /// * `url` - connection URL, e.g. `sqlite:data/vars.db?mode=rwc`
    /// * `max_connections` - pool size
    /// * `bus` - event bus for lifecycle notifications
    pub async fn connect(
        url: &str,
        max_connections: u32,
        bus: EventBus,
    ) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let connect_bus = bus.clone();
        let acquire_bus = bus.clone();
        let release_bus = bus.clone();

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .after_connect(move |_conn, _meta| {
                connect_bus.emit(StorageEvent::Connection);
                Box::pin(async { Ok::<_, sqlx::Error>(()) })
            })
            .before_acquire(move |_conn, _meta| {
                acquire_bus.emit(StorageEvent::Acquire);
                Box::pin(async { Ok::<_, sqlx::Error>(true) })
            })
            .after_release(move |_conn, _meta| {
                release_bus.emit(StorageEvent::Release);
                Box::pin(async { Ok::<_, sqlx::Error>(true) })
            })
            .connect_with(options)
            .await?;

        Ok(Self {
            inner: pool,
            bus,
            max_connections,
        })
    }

    /// Get the underlying sqlx pool for query execution.
    ///
    /// Emits `enqueue` when the pool is saturated, i.e. the next acquisition
    /// will have to wait for a connection to be released.
    pub fn executor(&self) -> &SqlxPool {
        if self.inner.num_idle() == 0 && self.inner.size() >= self.max_connections {
            self.bus.emit(StorageEvent::Enqueue);
        }
        &self.inner
    }

    /// Issue a trivial round-trip query and return the elapsed time in
    /// milliseconds.
    pub async fn ping(&self) -> Result<i64, StorageError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(self.executor()).await?;
        Ok(start.elapsed().as_millis() as i64)
    }

    /// Close the connection pool gracefully and emit `disconnect`.
    pub async fn close(&self) {
        self.inner.close().await;
        self.bus.emit(StorageEvent::Disconnect);
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite:{}?mode=rwc", dir.path().join("pool.db").display())
    }

    #[tokio::test]
    async fn test_pool_connect_and_query() {
        let dir = tempdir().unwrap();
        let pool = DbPool::connect(&test_url(&dir), 2, EventBus::default())
            .await
            .unwrap();
        assert!(!pool.is_closed());

        let row: (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(pool.executor())
            .await
            .unwrap();
        assert_eq!(row.0, 1);

        pool.close().await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_ping_returns_elapsed_millis() {
        let dir = tempdir().unwrap();
        let pool = DbPool::connect(&test_url(&dir), 2, EventBus::default())
            .await
            .unwrap();
        let latency = pool.ping().await.unwrap();
        assert!(latency >= 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_pool_lifecycle_events() {
        let dir = tempdir().unwrap();
        let bus = EventBus::new(64, false);
        let mut rx = bus.subscribe();

        let pool = DbPool::connect(&test_url(&dir), 1, bus).await.unwrap();
        pool.ping().await.unwrap();
        pool.close().await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.as_ref().to_string());
        }
        assert!(seen.iter().any(|e| e == "connection"));
        assert!(seen.iter().any(|e| e == "acquire"));
        assert!(seen.iter().any(|e| e == "disconnect"));
    }

    #[tokio::test]
    async fn test_enqueue_emitted_when_pool_saturated() {
        let dir = tempdir().unwrap();
        let bus = EventBus::new(64, false);
        let mut rx = bus.subscribe();
        let pool = DbPool::connect(&test_url(&dir), 1, bus).await.unwrap();

        // Hold the pool's only connection; the next caller has to wait.
        let held = pool.executor().acquire().await.unwrap();
        let _ = pool.executor();
        drop(held);
        pool.close().await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.as_ref().to_string());
        }
        assert!(seen.iter().any(|e| e == "enqueue"));
    }
}
