//! The propagation engine: maps a propagation mode and the ambient execution
//! context onto an execution strategy, and hands off to the executor when a
//! new transaction is required.

use std::future::Future;
use std::sync::Arc;

use crate::context::Scope;
use crate::driver::{DataSource, IsolationLevel, TransactionHandle};
use crate::error::TransactionalError;
use crate::executor;
use crate::propagation::Propagation;
use crate::registry::{DataSourceRegistry, DEFAULT_DATA_SOURCE};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Manager-level configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How many hooks of one kind (`commit`, `rollback`, `complete`) can be
    /// registered on a single transaction before a leak warning is logged.
    /// `0` means unlimited.
    pub max_hook_handlers: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_hook_handlers: 10,
        }
    }
}

/// Per-call transaction options.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Resource name; [`DEFAULT_DATA_SOURCE`] when `None`.
    pub data_source: Option<String>,
    /// Propagation behavior; `REQUIRED` by default.
    pub propagation: Propagation,
    /// Isolation level forwarded to the driver when a new transaction opens.
    pub isolation: Option<IsolationLevel>,
}

impl TransactionOptions {
    /// Options with the given propagation mode on the default data source.
    #[must_use]
    pub fn propagation(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionManager
// ---------------------------------------------------------------------------

/// Owns the data-source registry and runs units of work under the
/// propagation policy.
///
/// Decision table, where "active" is the active transaction for the resolved
/// resource in the ambient scope:
///
/// | Mode            | active present                  | active absent            |
/// |-----------------|---------------------------------|--------------------------|
/// | `REQUIRED`      | join                            | new transaction          |
/// | `REQUIRES_NEW`  | new transaction                 | new transaction          |
/// | `NESTED`        | new transaction                 | new transaction          |
/// | `SUPPORTS`      | join                            | fresh hook scope, no txn |
/// | `MANDATORY`     | join                            | propagation error        |
/// | `NEVER`         | propagation error               | fresh hook scope, no txn |
/// | `NOT_SUPPORTED` | hide slot, fresh hooks, restore | run as-is                |
///
/// Every call runs inside a freshly forked scope, so a caller that fires
/// several propagated calls without awaiting each one gives every call an
/// independent view of the active slot.
pub struct TransactionManager {
    registry: DataSourceRegistry,
    config: ManagerConfig,
}

impl TransactionManager {
    /// Creates a manager with the given configuration and an empty
    /// data-source registry.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            registry: DataSourceRegistry::new(),
            config,
        }
    }

    /// The underlying data-source registry.
    #[must_use]
    pub fn registry(&self) -> &DataSourceRegistry {
        &self.registry
    }

    /// Registers a data source under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionalError::DuplicateDataSource`] if `name` is
    /// already registered.
    pub fn add_data_source(
        &self,
        name: impl Into<String>,
        source: Arc<dyn DataSource>,
    ) -> Result<(), TransactionalError> {
        self.registry.register(name, source)
    }

    /// Removes the data source registered under `name`.
    pub fn remove_data_source(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Runs `f` with `REQUIRED` propagation on the default data source.
    ///
    /// # Errors
    ///
    /// See [`TransactionManager::run_with`].
    pub async fn run<T, F, Fut>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run_with(TransactionOptions::default(), f).await
    }

    /// Runs `f` under the propagation policy described by `options`.
    ///
    /// # Errors
    ///
    /// - [`TransactionalError::UnknownDataSource`] if the named resource was
    ///   never registered.
    /// - [`TransactionalError::MandatoryPropagation`] /
    ///   [`TransactionalError::NeverPropagation`] on policy violations;
    ///   raised before any driver call.
    /// - [`TransactionalError::Driver`] if `begin` or `commit` fails.
    /// - Any error raised by `f`, re-raised unchanged after rollback.
    pub async fn run_with<T, F, Fut>(&self, options: TransactionOptions, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let resource = options
            .data_source
            .unwrap_or_else(|| DEFAULT_DATA_SOURCE.to_string());
        let source = self
            .registry
            .lookup(&resource)
            .ok_or_else(|| TransactionalError::UnknownDataSource(resource.clone()))?;

        let scope = Scope::current().map_or_else(Scope::new, |current| current.fork());
        let call_scope = scope.clone();
        let max_hook_handlers = self.config.max_hook_handlers;

        scope
            .enter(async move {
                let active = self.registry.get_active(&call_scope, &resource);

                match options.propagation {
                    Propagation::Required => {
                        if active.is_some() {
                            f().await
                        } else {
                            executor::run_in_new_transaction(
                                &self.registry,
                                &source,
                                &resource,
                                options.isolation,
                                max_hook_handlers,
                                f,
                            )
                            .await
                        }
                    }

                    Propagation::RequiresNew | Propagation::Nested => {
                        executor::run_in_new_transaction(
                            &self.registry,
                            &source,
                            &resource,
                            options.isolation,
                            max_hook_handlers,
                            f,
                        )
                        .await
                    }

                    Propagation::Supports => {
                        if active.is_some() {
                            f().await
                        } else {
                            executor::run_with_fresh_hook_scope(max_hook_handlers, f).await
                        }
                    }

                    Propagation::Mandatory => {
                        if active.is_some() {
                            f().await
                        } else {
                            Err(TransactionalError::MandatoryPropagation.into())
                        }
                    }

                    Propagation::Never => {
                        if active.is_some() {
                            Err(TransactionalError::NeverPropagation.into())
                        } else {
                            executor::run_with_fresh_hook_scope(max_hook_handlers, f).await
                        }
                    }

                    Propagation::NotSupported => {
                        if let Some(current) = active {
                            self.registry.set_active(&call_scope, &resource, None);
                            let result =
                                executor::run_with_fresh_hook_scope(max_hook_handlers, f).await;
                            self.registry
                                .set_active(&call_scope, &resource, Some(current));
                            result
                        } else {
                            f().await
                        }
                    }
                }
            })
            .await
    }

    /// The active transaction for `resource` in the ambient scope, if any.
    ///
    /// This is the explicit adapter by which a unit of work reaches the
    /// transaction it is running in.
    #[must_use]
    pub fn current_transaction(&self, resource: &str) -> Option<Arc<dyn TransactionHandle>> {
        let scope = Scope::current()?;
        self.registry.get_active(&scope, resource)
    }

    /// The active transaction for `resource`, downcast to the concrete
    /// driver handle type.
    #[must_use]
    pub fn current_transaction_as<T: Send + Sync + 'static>(
        &self,
        resource: &str,
    ) -> Option<Arc<T>> {
        self.current_transaction(resource)
            .and_then(|handle| handle.as_any().downcast::<T>().ok())
    }
}
