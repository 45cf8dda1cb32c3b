use thiserror::Error;

/// Errors produced by the store layer.
///
/// Absence is not an error here: lookups that may miss return `Option`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The caller broke a precondition: self-conversation, unknown
    /// conversation or message id, empty message body.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller is not allowed to act on this record.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
