//! varstore - Variable Persistence Library
//!
//! A thin key-value persistence layer that lets a scripting runtime store
//! named variables durably inside a relational backend behind a uniform
//! get/set/delete/scan contract, plus a human-readable duration codec for
//! cooldown and countdown arithmetic.
//!
//! # Architecture
//!
//! - **Storage**: pooled SQLite persistence with lazy table provisioning,
//!   composite-key encoding, and a process-visible event channel
//! - **Time**: pure conversion between duration strings and milliseconds
//! - **Backup**: one-time replay of a legacy file-based store
//!
//! # Example
//!
//! ```rust,ignore
//! use varstore::{KvStore, StoreOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), varstore::StorageError> {
//!     let store = KvStore::connect(StoreOptions::new(
//!         ["main"],
//!         "sqlite:data/vars.db?mode=rwc",
//!     ))
//!     .await?;
//!
//!     store.set("main", "score", Some("user1"), &json!(42)).await?;
//!     let record = store.get("main", "score", Some("user1")).await?;
//!     println!("{record:?}");
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod storage;
pub mod time;

pub use backup::{ImportStats, import};
pub use storage::{
    BackupOptions, DbPool, EventBus, KvStore, Record, RecordFilter, SortOrder, StorageError,
    StorageEvent, StoreBuilder, StoreOptions,
};
pub use time::{ParsedTime, Time, TimeBreakdown, TimeError};
