use thiserror::Error;

/// Errors that can occur when interacting with the key-value store.
///
/// A failed precondition is not an error at this layer; it is reported as
/// [`ConditionalOutcome::PreconditionFailed`](crate::ConditionalOutcome) and
/// mapped to a domain error by the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The mutation cannot be applied to the current document.
    #[error("Invalid mutation on '{key}': {reason}")]
    InvalidMutation { key: String, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn invalid_mutation(key: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidMutation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
