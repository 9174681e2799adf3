use thiserror::Error;

/// Errors raised by a [`KvStore`](crate::KvStore) or while (de)serializing its values.
#[derive(Debug, Error)]
pub enum DbError {
    /// A value could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),

    /// The backing store failed.
    #[error("backend: {0}")]
    Backend(String),
}

/// Result type alias that has [`DbError`] as the error type.
pub type DbResult<T> = Result<T, DbError>;
