//! Committed-state store and the [`DataSource`] implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use txscope::{DataSource, IsolationLevel, TransactionHandle};

use crate::transaction::MemTransaction;

/// In-memory key/value store with transactional writes.
///
/// Cloning is cheap and clones share the same committed state, so a store
/// can be handed to the data-source registry and kept around for direct
/// (non-transactional) reads and seeding.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub(crate) committed: RwLock<HashMap<String, String>>,
    next_txn_id: AtomicU64,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store as a registrable data source.
    #[must_use]
    pub fn as_data_source(&self) -> Arc<dyn DataSource> {
        Arc::new(self.clone())
    }

    /// Reads a key from committed state. Uncommitted transactional writes
    /// are never visible here.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.committed.read().get(key).cloned()
    }

    /// Writes a key directly to committed state, outside any transaction.
    /// Intended for seeding fixtures.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.committed.write().insert(key.into(), value.into());
    }

    /// Number of committed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.committed.read().len()
    }

    /// Whether the committed state is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.committed.read().is_empty()
    }
}

#[async_trait]
impl DataSource for MemStore {
    async fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> anyhow::Result<Arc<dyn TransactionHandle>> {
        let id = self.inner.next_txn_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(id, ?isolation, "memstore transaction started");
        Ok(Arc::new(MemTransaction::new(
            id,
            isolation,
            self.inner.clone(),
        )))
    }
}
