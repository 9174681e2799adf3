//! Errors raised while handling covenant signatures.

use secp256k1::XOnlyPublicKey;
use thiserror::Error;

/// Errors raised while building a committee or handling its adaptor signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CovenantError {
    /// The committee has no members.
    #[error("covenant committee is empty")]
    EmptyCommittee,

    /// A key appears more than once in the committee.
    #[error("duplicate covenant member {0}")]
    DuplicateMember(XOnlyPublicKey),

    /// The quorum is zero or larger than the committee.
    #[error("quorum {quorum} is invalid for a committee of {size}")]
    InvalidQuorum {
        /// The requested quorum.
        quorum: u32,
        /// The number of members.
        size: usize,
    },

    /// Decrypting the adaptor signature yielded an invalid signature.
    #[error("adaptor signature could not be completed")]
    AdaptFailed,

    /// The completed signature does not belong to the adaptor signature.
    #[error("completed signature does not reveal the encryption secret")]
    SecretNotRevealed,

    /// A signature could not be decoded.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Result type alias that has [`CovenantError`] as the error type.
pub type CovenantResult<T> = Result<T, CovenantError>;
