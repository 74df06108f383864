//! Buffered transaction handle.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use txscope::{IsolationLevel, TransactionHandle};

use crate::error::MemStoreError;
use crate::store::StoreInner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
}

impl TxnState {
    fn as_str(self) -> &'static str {
        match self {
            TxnState::Active => "active",
            TxnState::Committed => "committed",
            TxnState::RolledBack => "rolled back",
        }
    }
}

/// An open transaction against a `MemStore`.
///
/// Writes land in a private buffer (`None` marks a delete) and become
/// visible to other readers only when `commit` applies the buffer under the
/// store's write lock. Reads overlay the buffer on committed state, so a
/// transaction sees its own writes. Dropping an unresolved handle discards
/// the buffer, which makes abandonment equivalent to rollback.
pub struct MemTransaction {
    id: u64,
    isolation: Option<IsolationLevel>,
    store: Arc<StoreInner>,
    state: Mutex<TxnState>,
    buffer: Mutex<HashMap<String, Option<String>>>,
}

impl MemTransaction {
    pub(crate) fn new(id: u64, isolation: Option<IsolationLevel>, store: Arc<StoreInner>) -> Self {
        Self {
            id,
            isolation,
            store,
            state: Mutex::new(TxnState::Active),
            buffer: Mutex::new(HashMap::new()),
        }
    }

    /// Monotonically increasing transaction identity.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Isolation level the transaction was opened with, if any.
    #[must_use]
    pub fn isolation(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    /// Buffers a write; visible to this transaction immediately, to others
    /// only after commit.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.buffer.lock().insert(key.into(), Some(value.into()));
    }

    /// Buffers a delete.
    pub fn delete(&self, key: impl Into<String>) {
        self.buffer.lock().insert(key.into(), None);
    }

    /// Reads a key with read-your-writes overlay: buffered writes and
    /// deletes shadow committed state.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(buffered) = self.buffer.lock().get(key) {
            return buffered.clone();
        }
        self.store.committed.read().get(key).cloned()
    }

    fn transition(&self, to: TxnState) -> Result<(), MemStoreError> {
        let mut state = self.state.lock();
        if *state != TxnState::Active {
            return Err(MemStoreError::AlreadyResolved {
                id: self.id,
                state: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }

    fn apply(&self) -> Result<(), MemStoreError> {
        self.transition(TxnState::Committed)?;
        let buffer = std::mem::take(&mut *self.buffer.lock());
        let mut committed = self.store.committed.write();
        for (key, value) in buffer {
            match value {
                Some(value) => {
                    committed.insert(key, value);
                }
                None => {
                    committed.remove(&key);
                }
            }
        }
        tracing::debug!(id = self.id, "memstore transaction committed");
        Ok(())
    }

    fn discard(&self) -> Result<(), MemStoreError> {
        self.transition(TxnState::RolledBack)?;
        self.buffer.lock().clear();
        tracing::debug!(id = self.id, "memstore transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl TransactionHandle for MemTransaction {
    async fn commit(&self) -> anyhow::Result<()> {
        self.apply().map_err(Into::into)
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        self.discard().map_err(Into::into)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for MemTransaction {
    fn drop(&mut self) {
        if *self.state.lock() == TxnState::Active {
            tracing::warn!(
                id = self.id,
                "memstore transaction dropped unresolved; discarding its writes"
            );
        }
    }
}
