//! Process-visible storage events.
//!
//! The store reports its lifecycle and diagnostics through an explicit
//! event bus instead of an ambient logger: consumers subscribe to know when
//! the store is serviceable (`connect`/`disconnect`) and to observe pool
//! pressure (`acquire`/`release`/`connection`/`enqueue`).

use strum_macros::{AsRefStr, Display};
use tokio::sync::broadcast;

/// Default capacity of the broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by the store.
///
/// The lowercase variant names are the contract surface; payloads carry the
/// diagnostic message where one exists.
#[derive(Debug, Clone, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum StorageEvent {
    /// Store connected and all tables provisioned.
    Connect,
    /// Store closed or connection lost.
    Disconnect,
    /// A steady-state operation failed.
    Error(String),
    /// Verbose operation trace.
    Debug(String),
    /// A pooled connection was acquired.
    Acquire,
    /// A pooled connection was returned.
    Release,
    /// A new physical connection was opened.
    Connection,
    /// An acquire had to wait because the pool was saturated.
    Enqueue,
}

/// Broadcast bus for [`StorageEvent`]s.
///
/// Emission never blocks and never fails an operation; events emitted with
/// no subscribers are simply dropped. With `debug` enabled every event is
/// additionally logged through `tracing`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StorageEvent>,
    debug: bool,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new bus.
    pub fn new(capacity: usize, debug: bool) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, debug }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: StorageEvent) {
        match &event {
            StorageEvent::Error(msg) => tracing::error!(event = %event, "{msg}"),
            StorageEvent::Debug(msg) => {
                if self.debug {
                    tracing::debug!(event = %event, "{msg}");
                }
            }
            _ => {
                if self.debug {
                    tracing::debug!(event = %event, "storage event");
                }
            }
        }
        let _ = self.tx.send(event);
    }

    /// Whether verbose event logging is enabled.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY, false)
    }
}
