//! Operation-level error taxonomy for tree and storage mutations.
//!
//! These are the failures that user-initiated operations surface to the
//! caller. Plumbing errors (config parsing, database open) have their own
//! types next to the code that produces them.

use thiserror::Error;

use crate::tree::ItemKind;

/// Failures of user-initiated tree/storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The feed-update lock is held by another critical operation.
    /// The operation is aborted; the caller must not queue or retry.
    #[error("another critical operation is ongoing; try again later")]
    LockBusy,

    /// A storage transaction failed (begin, statement, or commit).
    /// The cause is not distinguished further; nothing was applied.
    #[error("storage transaction failed")]
    Transaction(#[source] sqlx::Error),

    /// The item's kind does not support the requested operation.
    #[error("{kind:?} items do not support {action}")]
    Unsupported {
        action: &'static str,
        kind: ItemKind,
    },

    /// A step of the account-deletion cascade failed. Earlier steps are
    /// NOT undone (the cascade runs as independent statements).
    #[error("account deletion failed at step '{step}'")]
    Cascade {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A tree index was stale or invalid.
    #[error("stale or invalid tree index")]
    Lookup,
}
