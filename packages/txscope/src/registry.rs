//! Data-source registry: the process-wide mapping from resource names to
//! driver handles, plus the gated accessors for each scope's
//! active-transaction slot.
//!
//! The name map is the only structure mutated from multiple independent
//! top-level calls (registration at startup), so it lives in a [`DashMap`].
//! All transaction-scoped state stays in per-chain [`Scope`] storage.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::context::Scope;
use crate::driver::{DataSource, TransactionHandle};
use crate::error::TransactionalError;

/// Resource name used when a transactional call does not name one.
pub const DEFAULT_DATA_SOURCE: &str = "default";

/// Registry of named data sources, owned by the `TransactionManager`.
pub struct DataSourceRegistry {
    sources: DashMap<String, Arc<dyn DataSource>>,
}

impl DataSourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    /// Registers a data source under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionalError::DuplicateDataSource`] if `name` is
    /// already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
    ) -> Result<(), TransactionalError> {
        match self.sources.entry(name.into()) {
            Entry::Occupied(entry) => {
                Err(TransactionalError::DuplicateDataSource(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(source);
                Ok(())
            }
        }
    }

    /// Returns the data source registered under `name`, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.get(name).map(|entry| entry.value().clone())
    }

    /// Removes the data source registered under `name`. Returns whether a
    /// registration was removed.
    pub fn unregister(&self, name: &str) -> bool {
        self.sources.remove(name).is_some()
    }

    /// The active transaction for `name` in `scope`. Unregistered names
    /// always read as `None`, so stale scopes never resurrect a removed
    /// resource's state.
    #[must_use]
    pub fn get_active(&self, scope: &Scope, name: &str) -> Option<Arc<dyn TransactionHandle>> {
        if !self.sources.contains_key(name) {
            return None;
        }
        scope.slot(name)
    }

    /// Installs or clears the active transaction for `name` in `scope`.
    /// A no-op for unregistered names.
    pub fn set_active(
        &self,
        scope: &Scope,
        name: &str,
        handle: Option<Arc<dyn TransactionHandle>>,
    ) {
        if !self.sources.contains_key(name) {
            return;
        }
        scope.set_slot(name, handle);
    }
}

impl Default for DataSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
