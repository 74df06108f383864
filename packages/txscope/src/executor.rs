//! Transaction executor: drives begin/commit/rollback around a unit of
//! work, installs and clears the active-transaction slot, and guarantees
//! that the hook scope resolves on every exit path.

use std::future::Future;
use std::sync::Arc;

use crate::context::Scope;
use crate::driver::{DataSource, IsolationLevel};
use crate::error::TransactionalError;
use crate::hooks::{HookScope, TransactionOutcome};
use crate::registry::DataSourceRegistry;

/// Forks the ambient scope and installs a fresh hook scope in the fork.
fn fork_with_fresh_hooks(max_hook_handlers: usize) -> (Scope, Arc<HookScope>) {
    let scope = Scope::current().unwrap_or_default().fork();
    let hooks = Arc::new(HookScope::new(max_hook_handlers));
    scope.set_hook_scope(hooks.clone());
    (scope, hooks)
}

/// Runs `f` inside a brand-new transaction on `source`.
///
/// Sequence: open a fresh hook scope, `begin` on the driver, install the new
/// handle as the active transaction for `resource`, run `f`, clear the slot,
/// then commit or roll back depending on `f`'s outcome. The slot clear and
/// the hook resolution happen on every exit path. A rollback failure while
/// already unwinding is logged and suppressed so the original error is never
/// masked; a commit failure triggers a rollback attempt and propagates as a
/// driver error.
pub(crate) async fn run_in_new_transaction<T, F, Fut>(
    registry: &DataSourceRegistry,
    source: &Arc<dyn DataSource>,
    resource: &str,
    isolation: Option<IsolationLevel>,
    max_hook_handlers: usize,
    f: F,
) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let (scope, hooks) = fork_with_fresh_hooks(max_hook_handlers);
    let tx_scope = scope.clone();

    scope
        .enter(async move {
            let handle = match source.begin(isolation).await {
                Ok(handle) => handle,
                Err(err) => {
                    hooks.resolve(TransactionOutcome::RolledBack);
                    return Err(TransactionalError::Driver(err).into());
                }
            };
            tracing::debug!(resource, "transaction started");

            registry.set_active(&tx_scope, resource, Some(handle.clone()));
            let result = f().await;
            registry.set_active(&tx_scope, resource, None);

            match result {
                Ok(value) => match handle.commit().await {
                    Ok(()) => {
                        tracing::debug!(resource, "transaction committed");
                        hooks.resolve(TransactionOutcome::Committed);
                        Ok(value)
                    }
                    Err(commit_err) => {
                        if let Err(rollback_err) = handle.rollback().await {
                            tracing::warn!(
                                resource,
                                error = %rollback_err,
                                "rollback after failed commit also failed"
                            );
                        }
                        hooks.resolve(TransactionOutcome::RolledBack);
                        Err(TransactionalError::Driver(commit_err).into())
                    }
                },
                Err(err) => {
                    if let Err(rollback_err) = handle.rollback().await {
                        tracing::warn!(
                            resource,
                            error = %rollback_err,
                            "rollback failed; surfacing the original unit-of-work error"
                        );
                    }
                    tracing::debug!(resource, "transaction rolled back");
                    hooks.resolve(TransactionOutcome::RolledBack);
                    Err(err)
                }
            }
        })
        .await
}

/// Runs `f` with a fresh hook scope but no transaction, resolving the hooks
/// from `f`'s outcome. Used by the propagation modes that execute outside of
/// any transaction (SUPPORTS/NEVER without an active transaction, and the
/// suspended body of NOT_SUPPORTED).
pub(crate) async fn run_with_fresh_hook_scope<T, F, Fut>(
    max_hook_handlers: usize,
    f: F,
) -> anyhow::Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let (scope, hooks) = fork_with_fresh_hooks(max_hook_handlers);

    scope
        .enter(async move {
            let result = f().await;
            let outcome = if result.is_ok() {
                TransactionOutcome::Committed
            } else {
                TransactionOutcome::RolledBack
            };
            hooks.resolve(outcome);
            result
        })
        .await
}
