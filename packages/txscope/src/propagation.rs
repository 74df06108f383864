//! Propagation modes: the policy governing whether a unit of work joins,
//! creates, suspends, or rejects a transaction based on its caller's context.

use serde::{Deserialize, Serialize};

/// Spring-style transaction propagation behavior.
///
/// The engine resolves each mode against "is there an active transaction for
/// this resource in the current scope" — see the decision table on
/// `TransactionManager::run_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// Join the active transaction; open a new one if there is none.
    #[default]
    Required,
    /// Always open a new, independent transaction.
    RequiresNew,
    /// Alias of [`Propagation::RequiresNew`]: always opens a new independent
    /// transaction. No savepoint semantics are provided.
    Nested,
    /// Join the active transaction if present; otherwise run without one.
    Supports,
    /// Require an active transaction; fail if there is none.
    Mandatory,
    /// Require the absence of a transaction; fail if one is active.
    Never,
    /// Run without a transaction, hiding any active one for the duration.
    NotSupported,
}

impl Propagation {
    /// The conventional SCREAMING_SNAKE_CASE name, as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::Nested => "NESTED",
            Propagation::Supports => "SUPPORTS",
            Propagation::Mandatory => "MANDATORY",
            Propagation::Never => "NEVER",
            Propagation::NotSupported => "NOT_SUPPORTED",
        }
    }
}

impl std::fmt::Display for Propagation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
