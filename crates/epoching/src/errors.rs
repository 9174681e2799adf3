//! Errors raised by epoch bookkeeping.

use btc_staking_db::DbError;
use btc_staking_params::ParamsError;
use btc_staking_primitives::types::BlockHeight;
use thiserror::Error;

/// Errors raised while advancing epochs or updating their parameters.
#[derive(Debug, Error)]
pub enum EpochingError {
    /// The genesis epoch has not been stored yet.
    #[error("epoching is not initialized")]
    NotInitialized,

    /// Genesis was requested on a store that already has epochs.
    #[error("epoching is already initialized")]
    AlreadyInitialized,

    /// A block arrived out of order.
    #[error("expected block at height {expected}, got {actual}")]
    UnexpectedHeight {
        /// The height the current epoch expects next at the latest.
        expected: BlockHeight,
        /// The height that was delivered.
        actual: BlockHeight,
    },

    /// The new parameters are invalid.
    #[error("invalid params: {0}")]
    InvalidParams(#[from] ParamsError),

    /// The store failed.
    #[error("db: {0}")]
    Db(#[from] DbError),
}

/// Result type alias that has [`EpochingError`] as the error type.
pub type EpochingResult<T> = Result<T, EpochingError>;
