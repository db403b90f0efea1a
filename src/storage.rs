//! Storage Layer
//!
//! Key-value variable persistence over a pooled relational backend:
//!
//! - [`KvStore`]: the operation surface (`get`/`set`/`delete`/`drop`/
//!   `delete_many`/`find_one`/`find_many`/`all`/`ping`)
//! - [`StoreOptions`] / [`StoreBuilder`]: configuration and bootstrap
//! - [`TableRegistry`]: lazy table provisioning against the backend catalog
//! - [`EventBus`] / [`StorageEvent`]: process-visible lifecycle and
//!   diagnostics channel
//! - [`DbPool`]: pooled connection source with a latency probe

mod builder;
pub mod codec;
mod error;
mod events;
mod facade;
mod pool;
mod registry;

pub use builder::{BackupOptions, StoreBuilder, StoreOptions};
pub use codec::{EncodedValue, encode_key, encode_value};
pub use error::StorageError;
pub use events::{EventBus, StorageEvent};
pub use facade::{DEFAULT_PAGE_SIZE, KvStore, Record, RecordFilter, SortOrder};
pub use pool::DbPool;
pub use registry::{RESERVED_TABLE, TableRegistry};
