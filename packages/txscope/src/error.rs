//! Error kinds surfaced by the propagation engine.

/// Errors raised by the transaction machinery itself, as opposed to errors
/// raised by a unit of work (which pass through unchanged).
///
/// Configuration errors (`DuplicateDataSource`, `UnknownDataSource`) indicate
/// wiring mistakes and are never retried. Propagation errors
/// (`MandatoryPropagation`, `NeverPropagation`) are raised before any driver
/// call, so no commit or rollback is ever attempted on those paths.
/// Application code can branch on the kind via
/// `anyhow::Error::downcast_ref::<TransactionalError>()`.
#[derive(Debug, thiserror::Error)]
pub enum TransactionalError {
    #[error("data source \"{0}\" has already been added")]
    DuplicateDataSource(String),

    #[error("no data source registered under \"{0}\"; add it before running transactional work")]
    UnknownDataSource(String),

    #[error("no existing transaction found for transaction marked with propagation 'MANDATORY'")]
    MandatoryPropagation,

    #[error("found an existing transaction, transaction marked with propagation 'NEVER'")]
    NeverPropagation,

    #[error("transaction driver error: {0}")]
    Driver(#[source] anyhow::Error),
}

impl TransactionalError {
    /// Whether this error is a propagation-policy violation rather than a
    /// configuration or driver problem.
    #[must_use]
    pub fn is_propagation_violation(&self) -> bool {
        matches!(
            self,
            TransactionalError::MandatoryPropagation | TransactionalError::NeverPropagation
        )
    }
}
