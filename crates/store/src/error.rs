use thiserror::Error;

/// Errors that can occur when talking to the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The call exceeded its request-scoped timeout.
    ///
    /// Surfaced to callers as retryable; inventory is never left in an
    /// indeterminate state because every mutation is a single atomic
    /// statement or transaction.
    #[error("store call timed out")]
    Timeout,

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A conditional update lost a race: the row it expected is gone or has
    /// already moved to another status.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("invalid stored value: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
