//! Errors raised by the EOTS scheme.

use thiserror::Error;

/// Errors raised while signing, verifying or extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EotsError {
    /// The bytes do not encode an x-only point on the curve.
    #[error("invalid x-only point")]
    InvalidPoint,

    /// The bytes do not encode a scalar below the curve order.
    #[error("invalid scalar")]
    InvalidScalar,

    /// The signature does not verify.
    #[error("invalid signature")]
    BadSignature,

    /// Both signatures are over the same message, so nothing can be extracted.
    #[error("signatures are not conflicting")]
    NotConflicting,

    /// The extracted key does not match the signer's public key.
    #[error("extracted key does not match the public key")]
    ExtractionMismatch,
}

/// Result type alias that has [`EotsError`] as the error type.
pub type EotsResult<T> = Result<T, EotsError>;
