//! Hook scopes: per-top-level-transaction registries of commit, rollback,
//! and complete callbacks.
//!
//! A fresh hook scope is opened by the executor whenever a new transaction
//! (or an explicit no-transaction block) starts. Propagation modes that join
//! an existing transaction inherit the enclosing hook scope instead of
//! opening their own, so a callback registered in a nested unit fires only
//! when the outermost transaction resolves. Each scope resolves exactly
//! once; callbacks fire in registration order and failures are isolated per
//! callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Scope;

/// How the enclosing top-level transaction (or no-transaction block) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

type OutcomeHook = Box<dyn FnOnce() + Send>;
type CompleteHook = Box<dyn FnOnce(TransactionOutcome) + Send>;

// ---------------------------------------------------------------------------
// HookScope
// ---------------------------------------------------------------------------

/// Ordered commit/rollback/complete callback lists for one top-level unit.
///
/// `max_handlers` bounds each list before a leak warning is logged, the
/// equivalent of an event emitter's max-listener check; `0` means unlimited.
pub struct HookScope {
    max_handlers: usize,
    /// `None` once resolved; late registrations are warned about and dropped.
    lists: Mutex<Option<HookLists>>,
}

#[derive(Default)]
struct HookLists {
    on_commit: Vec<OutcomeHook>,
    on_rollback: Vec<OutcomeHook>,
    on_complete: Vec<CompleteHook>,
}

impl HookScope {
    #[must_use]
    pub(crate) fn new(max_handlers: usize) -> Self {
        Self {
            max_handlers,
            lists: Mutex::new(Some(HookLists::default())),
        }
    }

    pub(crate) fn add_commit(&self, hook: OutcomeHook) {
        self.add("commit", |lists| &mut lists.on_commit, hook);
    }

    pub(crate) fn add_rollback(&self, hook: OutcomeHook) {
        self.add("rollback", |lists| &mut lists.on_rollback, hook);
    }

    pub(crate) fn add_complete(&self, hook: CompleteHook) {
        self.add("complete", |lists| &mut lists.on_complete, hook);
    }

    fn add<T>(&self, kind: &'static str, list: impl FnOnce(&mut HookLists) -> &mut Vec<T>, hook: T) {
        let mut guard = self.lists.lock();
        let Some(lists) = guard.as_mut() else {
            tracing::warn!(kind, "transaction hook registered after resolution; ignoring");
            return;
        };
        let list = list(lists);
        list.push(hook);
        if self.max_handlers != 0 && list.len() > self.max_handlers {
            tracing::warn!(
                kind,
                count = list.len(),
                max = self.max_handlers,
                "hook handler count exceeds max_hook_handlers; possible leak"
            );
        }
    }

    /// Fires the callbacks matching `outcome`, then every complete callback,
    /// in registration order, and discards the scope. A second call is a
    /// no-op: each callback fires at most once.
    pub(crate) fn resolve(&self, outcome: TransactionOutcome) {
        let Some(lists) = self.lists.lock().take() else {
            return;
        };

        let matching = match outcome {
            TransactionOutcome::Committed => lists.on_commit,
            TransactionOutcome::RolledBack => lists.on_rollback,
        };
        for hook in matching {
            run_isolated(hook);
        }
        for hook in lists.on_complete {
            run_isolated(move || hook(outcome));
        }
    }
}

/// Runs one callback, catching panics so a failing hook never blocks its
/// siblings or disturbs the already-decided transaction outcome.
fn run_isolated(hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        tracing::error!("transaction hook panicked; remaining hooks still run");
    }
}

// ---------------------------------------------------------------------------
// Ambient registration
// ---------------------------------------------------------------------------

fn ambient_hook_scope(kind: &'static str) -> Option<Arc<HookScope>> {
    let hooks = Scope::current().and_then(|scope| scope.hook_scope());
    if hooks.is_none() {
        tracing::warn!(
            kind,
            "transaction hook registered outside of an open hook scope; ignoring"
        );
    }
    hooks
}

/// Registers a callback that fires exactly once if the enclosing top-level
/// transaction commits. Outside any open hook scope this is a no-op and logs
/// a warning.
pub fn on_commit<F: FnOnce() + Send + 'static>(hook: F) {
    if let Some(hooks) = ambient_hook_scope("commit") {
        hooks.add_commit(Box::new(hook));
    }
}

/// Registers a callback that fires exactly once if the enclosing top-level
/// transaction rolls back. Outside any open hook scope this is a no-op and
/// logs a warning.
pub fn on_rollback<F: FnOnce() + Send + 'static>(hook: F) {
    if let Some(hooks) = ambient_hook_scope("rollback") {
        hooks.add_rollback(Box::new(hook));
    }
}

/// Registers a callback that fires exactly once when the enclosing top-level
/// transaction resolves, with the outcome. Outside any open hook scope this
/// is a no-op and logs a warning.
pub fn on_complete<F: FnOnce(TransactionOutcome) + Send + 'static>(hook: F) {
    if let Some(hooks) = ambient_hook_scope("complete") {
        hooks.add_complete(Box::new(hook));
    }
}
