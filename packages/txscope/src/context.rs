//! Execution-context store: an ambient, per-call-chain scope carrying the
//! active-transaction slots and the current hook scope.
//!
//! A [`Scope`] is a value (cheaply clonable, `Arc` inner) made ambient for
//! the duration of a future via [`Scope::enter`], which is backed by a tokio
//! task-local. Everything the future awaits observes the same scope; sibling
//! chains entered concurrently never observe each other's scope. Forking
//! copy-inherits the parent's state, so mutations made inside a forked scope
//! are invisible to the parent — the contract that lets a caller fire several
//! propagated calls without awaiting each one, with every call getting its
//! own independent view of the active transaction.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::TransactionHandle;
use crate::hooks::HookScope;

tokio::task_local! {
    static CURRENT: Scope;
}

/// Per-call-chain execution scope.
///
/// Holds one active-transaction slot per resource name plus a pointer to the
/// innermost open [`HookScope`]. Mutating a slot never touches parent or
/// sibling scopes; only [`Scope::fork`] transfers state, by copy.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    /// Resource name -> handle of the currently open transaction.
    /// Guards are never held across an await point.
    slots: Mutex<HashMap<String, Arc<dyn TransactionHandle>>>,
    /// Innermost open hook scope, inherited by forks that join a transaction.
    hooks: Mutex<Option<Arc<HookScope>>>,
}

impl Scope {
    /// Creates an empty root scope, as established once per independent
    /// top-level invocation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ambient scope of the calling chain, or `None` when called outside
    /// any [`Scope::enter`].
    #[must_use]
    pub fn current() -> Option<Scope> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Creates a child scope that copy-inherits the active-transaction slots
    /// and the hook-scope pointer. Slot writes in the child stay in the
    /// child; hook registrations still reach the shared outer hook scope.
    #[must_use]
    pub fn fork(&self) -> Scope {
        let slots = self.inner.slots.lock().clone();
        let hooks = self.inner.hooks.lock().clone();
        Scope {
            inner: Arc::new(ScopeInner {
                slots: Mutex::new(slots),
                hooks: Mutex::new(hooks),
            }),
        }
    }

    /// Runs `fut` with this scope ambient for its entire duration, including
    /// across await points, restoring the previous ambient scope afterwards.
    ///
    /// Concurrent `enter` calls from sibling chains do not interfere. This is
    /// also the attachment point for spawned tasks: capture a clone of the
    /// scope and `enter` it inside the spawned future to keep the task inside
    /// the originating chain.
    pub async fn enter<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    pub(crate) fn slot(&self, resource: &str) -> Option<Arc<dyn TransactionHandle>> {
        self.inner.slots.lock().get(resource).cloned()
    }

    pub(crate) fn set_slot(&self, resource: &str, handle: Option<Arc<dyn TransactionHandle>>) {
        let mut slots = self.inner.slots.lock();
        match handle {
            Some(handle) => {
                slots.insert(resource.to_string(), handle);
            }
            None => {
                slots.remove(resource);
            }
        }
    }

    pub(crate) fn hook_scope(&self) -> Option<Arc<HookScope>> {
        self.inner.hooks.lock().clone()
    }

    pub(crate) fn set_hook_scope(&self, hooks: Arc<HookScope>) {
        *self.inner.hooks.lock() = Some(hooks);
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resources: Vec<String> = self.inner.slots.lock().keys().cloned().collect();
        f.debug_struct("Scope")
            .field("active_resources", &resources)
            .field("has_hook_scope", &self.inner.hooks.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use async_trait::async_trait;

    use super::*;

    struct NoopHandle;

    #[async_trait]
    impl TransactionHandle for NoopHandle {
        async fn commit(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn rollback(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[tokio::test]
    async fn no_ambient_scope_outside_enter() {
        assert!(Scope::current().is_none());

        let scope = Scope::new();
        scope
            .enter(async {
                assert!(Scope::current().is_some());
            })
            .await;

        assert!(Scope::current().is_none());
    }

    #[tokio::test]
    async fn fork_copy_inherits_slots() {
        let parent = Scope::new();
        parent.set_slot("default", Some(Arc::new(NoopHandle)));

        let child = parent.fork();
        assert!(child.slot("default").is_some());

        // Clearing in the child must not leak back into the parent.
        child.set_slot("default", None);
        assert!(child.slot("default").is_none());
        assert!(parent.slot("default").is_some());
    }

    #[tokio::test]
    async fn fork_inherits_hook_scope_by_reference() {
        let parent = Scope::new();
        let hooks = Arc::new(HookScope::new(10));
        parent.set_hook_scope(hooks.clone());

        let child = parent.fork();
        let inherited = child.hook_scope().unwrap();
        assert!(Arc::ptr_eq(&hooks, &inherited));
    }

    #[tokio::test]
    async fn sibling_chains_do_not_observe_each_other() {
        let a = Scope::new();
        let b = Scope::new();

        let chain_a = a.clone().enter(async {
            Scope::current()
                .unwrap()
                .set_slot("default", Some(Arc::new(NoopHandle)));
            tokio::task::yield_now().await;
            assert!(Scope::current().unwrap().slot("default").is_some());
        });
        let chain_b = b.clone().enter(async {
            tokio::task::yield_now().await;
            assert!(Scope::current().unwrap().slot("default").is_none());
        });

        tokio::join!(chain_a, chain_b);
        assert!(a.slot("default").is_some());
        assert!(b.slot("default").is_none());
    }

    #[tokio::test]
    async fn nested_enter_restores_previous_scope() {
        let outer = Scope::new();
        outer.set_slot("default", Some(Arc::new(NoopHandle)));

        outer
            .clone()
            .enter(async {
                let inner = Scope::new();
                inner
                    .enter(async {
                        assert!(Scope::current().unwrap().slot("default").is_none());
                    })
                    .await;
                assert!(Scope::current().unwrap().slot("default").is_some());
            })
            .await;
    }
}
