use thiserror::Error;

/// Errors that can occur when interacting with the marketplace store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row that a write expected to exist was not there.
    #[error("Missing {table} row for {key}")]
    MissingRow { table: &'static str, key: i64 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The storage backend rejected an operation.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
