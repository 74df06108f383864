//! Store error kinds.

/// Errors raised by the in-memory store.
#[derive(Debug, thiserror::Error)]
pub enum MemStoreError {
    /// The transaction was already committed or rolled back; handles resolve
    /// at most once.
    #[error("transaction {id} already resolved as {state}")]
    AlreadyResolved { id: u64, state: &'static str },
}
