//! Hook lifecycle integration tests: exactly-once firing per outcome,
//! routing of nested registrations to the outermost transaction, and hook
//! behavior on the no-transaction paths.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use txscope::{
    on_commit, on_complete, on_rollback, DataSource, IsolationLevel, ManagerConfig, Propagation,
    TransactionHandle, TransactionManager, TransactionOptions, TransactionOutcome,
    DEFAULT_DATA_SOURCE,
};
use txscope_memstore::MemStore;

type EventLog = Arc<Mutex<Vec<String>>>;

fn manager_with_store() -> TransactionManager {
    let manager = TransactionManager::new(ManagerConfig::default());
    manager
        .add_data_source(DEFAULT_DATA_SOURCE, MemStore::new().as_data_source())
        .unwrap();
    manager
}

fn push(log: &EventLog, event: &str) {
    log.lock().push(event.to_string());
}

#[tokio::test]
async fn commit_hooks_fire_once_after_the_body_completes() {
    let manager = manager_with_store();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    manager
        .run(|| async {
            let (commit_log, rollback_log, complete_log) = (log.clone(), log.clone(), log.clone());
            on_commit(move || push(&commit_log, "commit"));
            on_rollback(move || push(&rollback_log, "rollback"));
            on_complete(move |outcome| push(&complete_log, &format!("complete:{outcome:?}")));
            push(&log, "body-end");
            Ok(())
        })
        .await
        .unwrap();

    let events = log.lock().clone();
    assert_eq!(events, vec!["body-end", "commit", "complete:Committed"]);
}

#[tokio::test]
async fn rollback_hooks_fire_on_unit_of_work_failure() {
    let manager = manager_with_store();
    let commits = Arc::new(AtomicU32::new(0));
    let rollbacks = Arc::new(AtomicU32::new(0));
    let outcomes: EventLog = Arc::new(Mutex::new(Vec::new()));

    let result: anyhow::Result<()> = manager
        .run(|| async {
            let commits = commits.clone();
            let rollbacks = rollbacks.clone();
            let outcomes = outcomes.clone();
            on_commit(move || {
                commits.fetch_add(1, Ordering::SeqCst);
            });
            on_rollback(move || {
                rollbacks.fetch_add(1, Ordering::SeqCst);
            });
            on_complete(move |outcome| {
                assert_eq!(outcome, TransactionOutcome::RolledBack);
                outcomes.lock().push("complete".to_string());
            });
            anyhow::bail!("failure")
        })
        .await;

    assert!(result.is_err());
    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.lock().len(), 1);
}

#[tokio::test]
async fn nested_join_routes_hooks_to_the_outer_transaction() {
    let manager = manager_with_store();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    manager
        .run(|| async {
            manager
                .run(|| async {
                    let hook_log = log.clone();
                    on_commit(move || push(&hook_log, "inner-hook"));
                    Ok(())
                })
                .await?;
            // The inner call already returned; its hook must not have fired.
            push(&log, "outer-body-end");
            Ok(())
        })
        .await
        .unwrap();

    let events = log.lock().clone();
    assert_eq!(events, vec!["outer-body-end", "inner-hook"]);
}

#[tokio::test]
async fn requires_new_hooks_resolve_with_the_inner_transaction() {
    let manager = manager_with_store();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    manager
        .run(|| async {
            manager
                .run_with(
                    TransactionOptions::propagation(Propagation::RequiresNew),
                    || async {
                        let hook_log = log.clone();
                        on_commit(move || push(&hook_log, "inner-hook"));
                        Ok(())
                    },
                )
                .await?;
            push(&log, "outer-body-end");
            Ok(())
        })
        .await
        .unwrap();

    let events = log.lock().clone();
    assert_eq!(events, vec!["inner-hook", "outer-body-end"]);
}

#[tokio::test]
async fn no_transaction_paths_still_resolve_hooks() {
    let manager = manager_with_store();
    let committed = Arc::new(AtomicU32::new(0));
    let rolled_back = Arc::new(AtomicU32::new(0));

    // SUPPORTS without an active transaction: fresh hook scope, success.
    manager
        .run_with(
            TransactionOptions::propagation(Propagation::Supports),
            || async {
                let committed = committed.clone();
                on_commit(move || {
                    committed.fetch_add(1, Ordering::SeqCst);
                });
                Ok(())
            },
        )
        .await
        .unwrap();
    assert_eq!(committed.load(Ordering::SeqCst), 1);

    // NEVER without an active transaction: fresh hook scope, failure.
    let result: anyhow::Result<()> = manager
        .run_with(
            TransactionOptions::propagation(Propagation::Never),
            || async {
                let rolled_back = rolled_back.clone();
                on_rollback(move || {
                    rolled_back.fetch_add(1, Ordering::SeqCst);
                });
                anyhow::bail!("failure outside transaction")
            },
        )
        .await;
    assert!(result.is_err());
    assert_eq!(rolled_back.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn not_supported_body_gets_its_own_hook_scope() {
    let manager = manager_with_store();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    manager
        .run(|| async {
            manager
                .run_with(
                    TransactionOptions::propagation(Propagation::NotSupported),
                    || async {
                        let hook_log = log.clone();
                        on_commit(move || push(&hook_log, "suspended-hook"));
                        Ok(())
                    },
                )
                .await?;
            // The suspended block resolved on its own, before the outer
            // transaction did.
            push(&log, "outer-body-end");
            Ok(())
        })
        .await
        .unwrap();

    let events = log.lock().clone();
    assert_eq!(events, vec!["suspended-hook", "outer-body-end"]);
}

#[tokio::test]
async fn hooks_outside_any_transactional_call_are_ignored() {
    let fired = Arc::new(AtomicU32::new(0));

    let counter = fired.clone();
    on_commit(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = fired.clone();
    on_rollback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = fired.clone();
    on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Commit-failure outcome
// ---------------------------------------------------------------------------

struct BrokenCommitSource;

#[async_trait]
impl DataSource for BrokenCommitSource {
    async fn begin(
        &self,
        _isolation: Option<IsolationLevel>,
    ) -> anyhow::Result<Arc<dyn TransactionHandle>> {
        Ok(Arc::new(BrokenCommitHandle))
    }
}

struct BrokenCommitHandle;

#[async_trait]
impl TransactionHandle for BrokenCommitHandle {
    async fn commit(&self) -> anyhow::Result<()> {
        anyhow::bail!("commit wire failure")
    }
    async fn rollback(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[tokio::test]
async fn commit_failure_resolves_hooks_as_rolled_back() {
    let manager = TransactionManager::new(ManagerConfig::default());
    manager
        .add_data_source(DEFAULT_DATA_SOURCE, Arc::new(BrokenCommitSource))
        .unwrap();

    let commits = Arc::new(AtomicU32::new(0));
    let rollbacks = Arc::new(AtomicU32::new(0));

    let result = manager
        .run(|| async {
            let commits = commits.clone();
            let rollbacks = rollbacks.clone();
            on_commit(move || {
                commits.fetch_add(1, Ordering::SeqCst);
            });
            on_rollback(move || {
                rollbacks.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
}
