use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none, or the record is
    /// soft-deleted for the requester.
    #[error("Record not found")]
    NotFound,

    /// The caller is not a participant of the target conversation, or not
    /// the sender of the target message.
    #[error("Not authorized")]
    NotAuthorized,

    /// Malformed input: blank or over-length body, self-conversation, bad
    /// pagination parameters.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
