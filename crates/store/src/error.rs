use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A concurrent transaction removed a row this write depends on.
    #[error("Conflict on {entity}: {reason}")]
    Conflict {
        entity: &'static str,
        reason: String,
    },

    /// A value was refused before it reached storage.
    #[error("Invalid {entity}: {reason}")]
    Invalid {
        entity: &'static str,
        reason: String,
    },

    /// A persisted value could not be mapped back to an entity.
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt {
        entity: &'static str,
        reason: String,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
