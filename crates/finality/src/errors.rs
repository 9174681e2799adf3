//! Errors raised by finality voting.

use btc_staking_db::DbError;
use btc_staking_eots::EotsError;
use btc_staking_primitives::types::BlockHeight;
use secp256k1::XOnlyPublicKey;
use thiserror::Error;

/// Errors raised while committing randomness, voting, tallying or tracking liveness.
#[derive(Debug, Error)]
pub enum FinalityError {
    /// No randomness commitment of the provider covers the height.
    #[error("provider {fp_pk} has no randomness committed for height {height}")]
    NoCommitment {
        /// The voting provider.
        fp_pk: XOnlyPublicKey,
        /// The height voted on.
        height: BlockHeight,
    },

    /// The randomness opening does not match the commitment covering the height.
    #[error("randomness at height {0} does not open the commitment")]
    StaleCommitment(BlockHeight),

    /// The vote's EOTS signature does not verify.
    #[error("invalid finality signature by {0}")]
    BadSignature(XOnlyPublicKey),

    /// A commitment covers fewer values than the minimum.
    #[error("commitment of {num} values is below the minimum of {min}")]
    CommitmentTooSmall {
        /// Number of committed values.
        num: u64,
        /// Configured minimum.
        min: u64,
    },

    /// A commitment starts at or before the end of the provider's previous one.
    #[error("commitment starting at {start} overlaps the previous one ending at {last_end}")]
    OverlappingCommitment {
        /// Start of the new commitment.
        start: BlockHeight,
        /// End of the previous commitment.
        last_end: BlockHeight,
    },

    /// The commitment's height range does not fit in a `u64`.
    #[error("commitment height range overflows")]
    HeightOverflow,

    /// The commitment is not signed by the provider.
    #[error("commitment is not signed by {0}")]
    InvalidCommitmentSig(XOnlyPublicKey),

    /// The two votes are over the same block.
    #[error("votes are not conflicting")]
    NotConflicting,

    /// No signing info is tracked for the provider.
    #[error("no signing info for provider {0}")]
    UnknownProvider(XOnlyPublicKey),

    /// The provider is not jailed.
    #[error("provider {0} is not jailed")]
    NotJailed(XOnlyPublicKey),

    /// The provider's jail period has not elapsed.
    #[error("provider {fp_pk} is jailed until {jailed_until}")]
    StillJailed {
        /// The jailed provider.
        fp_pk: XOnlyPublicKey,
        /// Earliest block time at which it may unjail.
        jailed_until: u64,
    },

    /// An EOTS operation failed.
    #[error("eots: {0}")]
    Eots(#[from] EotsError),

    /// The store failed.
    #[error("db: {0}")]
    Db(#[from] DbError),
}

impl FinalityError {
    /// Returns `true` if the error indicates corrupted state rather than bad input.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

/// Result type alias that has [`FinalityError`] as the error type.
pub type FinalityResult<T> = Result<T, FinalityError>;
