//! Driver traits: the seam between the propagation engine and the actual
//! data source. The engine only ever needs `begin`, `commit`, and `rollback`;
//! everything else (SQL, pooling, wire protocol) stays behind these traits.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Isolation level requested when opening a transaction.
///
/// Drivers that do not support a level may map it to the nearest stronger
/// one or ignore it; the engine treats the value as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    Snapshot,
    RepeatableRead,
    Serializable,
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// A named, independently transactable resource (database, store, queue).
///
/// Registered once at startup under a resource name. The only capability the
/// engine needs is opening a fresh transaction.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Open a new transaction, optionally at the given isolation level.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying driver cannot start a transaction.
    async fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> anyhow::Result<Arc<dyn TransactionHandle>>;
}

// ---------------------------------------------------------------------------
// TransactionHandle
// ---------------------------------------------------------------------------

/// An open transaction produced by [`DataSource::begin`].
///
/// The handle is installed as the active transaction for its resource while
/// the unit of work runs, and resolved exactly once by the executor. The
/// `as_any` hook enables typed recovery of the concrete driver transaction
/// (see `TransactionManager::current_transaction_as`), the same
/// `Any`-downcast scheme the service registry uses for typed lookup.
///
/// Implementations should treat a handle dropped without `commit` or
/// `rollback` as rolled back: an abandoned call chain runs no further code,
/// so the drop path is the only place left to discard its writes.
#[async_trait]
pub trait TransactionHandle: Send + Sync + 'static {
    /// Make the transaction's writes durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver could not complete the commit; the
    /// transaction must then be considered not reliably committed.
    async fn commit(&self) -> anyhow::Result<()>;

    /// Discard the transaction's writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver could not roll back cleanly.
    async fn rollback(&self) -> anyhow::Result<()>;

    /// Upcast for typed downcasting of the concrete handle.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_serializes_to_snake_case() {
        let json = serde_json::to_string(&IsolationLevel::RepeatableRead).unwrap();
        assert_eq!(json, "\"repeatable_read\"");

        let level: IsolationLevel = serde_json::from_str("\"serializable\"").unwrap();
        assert_eq!(level, IsolationLevel::Serializable);
    }
}
