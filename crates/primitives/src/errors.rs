//! Errors raised while building taproot outputs and sighashes.

use bitcoin::{
    sighash::TaprootError,
    taproot::{TaprootBuilder, TaprootBuilderError},
};
use thiserror::Error;

/// Error while building taproot scripts, outputs or sighashes.
#[derive(Debug, Error)]
pub enum TxBuilderError {
    /// A script-only taproot output must have at least one leaf.
    #[error("no scripts provided for a script-only taproot output")]
    EmptyTapscript,

    /// Adding a leaf to the taptree failed.
    #[error("could not build taproot tree: {0}")]
    BuildFailed(#[from] TaprootBuilderError),

    /// The taptree could not be finalized, e.g., because leaves were left hidden.
    #[error("could not finalize taproot tree")]
    Incomplete,

    /// The requested leaf is not part of the taptree.
    #[error("leaf {0} is not part of the taptree")]
    UnknownLeaf(usize),

    /// The sighash could not be computed.
    #[error("could not compute sighash: {0}")]
    Sighash(#[from] TaprootError),
}

impl From<TaprootBuilder> for TxBuilderError {
    fn from(_: TaprootBuilder) -> Self {
        Self::Incomplete
    }
}

/// Result type alias that has [`TxBuilderError`] as the error type for succinctness.
pub type TxBuilderResult<T> = Result<T, TxBuilderError>;
