//! Errors raised by the header chain.

use bitcoin::BlockHash;
use btc_staking_db::DbError;
use btc_staking_primitives::types::BitcoinBlockHeight;
use thiserror::Error;

/// Errors raised while inserting or querying headers.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The header's parent has not been inserted.
    #[error("parent {0} of the header is unknown")]
    UnknownParent(BlockHash),

    /// The header's declared bits do not encode a valid target for the network.
    #[error("header {hash} declares invalid bits {bits:#010x}")]
    InvalidTarget {
        /// Hash of the rejected header.
        hash: BlockHash,
        /// The declared compact target.
        bits: u32,
    },

    /// The header's hash does not meet its declared target.
    #[error("header {0} does not satisfy its proof of work")]
    InvalidProofOfWork(BlockHash),

    /// The header has already been inserted.
    #[error("header {0} is already known")]
    Duplicate(BlockHash),

    /// The chain has no base header yet.
    #[error("header chain is not initialized")]
    NotInitialized,

    /// A base header was supplied to a chain that already has one.
    #[error("header chain is already initialized")]
    AlreadyInitialized,

    /// The canonical index points at a height with no header.
    ///
    /// This is an invariant violation.
    #[error("canonical index has no header at height {0}")]
    MissingCanonicalHeader(BitcoinBlockHeight),

    /// A header referenced by the chain is missing from the store.
    ///
    /// This is an invariant violation.
    #[error("header {0} is referenced but missing")]
    MissingHeader(BlockHash),

    /// The store failed.
    #[error("db: {0}")]
    Db(#[from] DbError),
}

impl HeaderError {
    /// Returns `true` if the error indicates corrupted state rather than bad input.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingCanonicalHeader(_) | Self::MissingHeader(_) | Self::Db(_)
        )
    }
}

/// Result type alias that has [`HeaderError`] as the error type.
pub type HeaderResult<T> = Result<T, HeaderError>;
