//! `txscope` — declarative transaction demarcation for async Rust.
//!
//! Callers mark a unit of work as transactional; the propagation engine
//! decides — from a [`Propagation`] mode and the ambient [`Scope`] — whether
//! to join an existing transaction, start a new one, suspend one, or run
//! outside any transaction. Commit/rollback/complete hooks fire exactly once
//! when the enclosing top-level transaction resolves.
//!
//! The actual data source stays behind the [`DataSource`] /
//! [`TransactionHandle`] driver traits; `txscope-memstore` provides the
//! in-memory reference implementation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use txscope::{ManagerConfig, Propagation, TransactionManager, TransactionOptions};
//!
//! # async fn demo(source: Arc<dyn txscope::DataSource>) -> anyhow::Result<()> {
//! let manager = TransactionManager::new(ManagerConfig::default());
//! manager.add_data_source("default", source)?;
//!
//! manager
//!     .run(|| async {
//!         txscope::on_commit(|| println!("committed"));
//!         manager
//!             .run_with(
//!                 TransactionOptions::propagation(Propagation::RequiresNew),
//!                 || async { Ok(()) },
//!             )
//!             .await
//!     })
//!     .await
//! # }
//! ```

pub mod context;
pub mod driver;
pub mod error;
mod executor;
pub mod hooks;
pub mod manager;
pub mod propagation;
pub mod registry;

pub use context::Scope;
pub use driver::{DataSource, IsolationLevel, TransactionHandle};
pub use error::TransactionalError;
pub use hooks::{on_commit, on_complete, on_rollback, TransactionOutcome};
pub use manager::{ManagerConfig, TransactionManager, TransactionOptions};
pub use propagation::Propagation;
pub use registry::{DataSourceRegistry, DEFAULT_DATA_SOURCE};
