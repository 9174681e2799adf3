//! Error types for the transaction graph.

use bitcoin::{Amount, OutPoint};
use btc_staking_covenant::CovenantError;
use btc_staking_primitives::errors::TxBuilderError;
use secp256k1::XOnlyPublicKey;
use thiserror::Error;

/// Errors that can occur while deriving or verifying staking transactions.
#[derive(Debug, Error)]
pub enum TxGraphError {
    /// The output does not pay to the derived script.
    #[error("output {vout} does not pay to the expected script")]
    ScriptMismatch {
        /// Index of the offending output.
        vout: u32,
    },

    /// The output carries a different value than expected.
    #[error("output {vout} carries {actual}, expected {expected}")]
    WrongAmount {
        /// Index of the offending output.
        vout: u32,
        /// The expected value.
        expected: Amount,
        /// The value found.
        actual: Amount,
    },

    /// The referenced output does not exist.
    #[error("output index {index} is out of bounds for a tx with {num_outputs} outputs")]
    WrongOutputIndex {
        /// The referenced index.
        index: u32,
        /// The number of outputs of the tx.
        num_outputs: usize,
    },

    /// The tx does not have the expected number of inputs.
    #[error("expected {expected} inputs, found {actual}")]
    WrongInputCount {
        /// Required number of inputs.
        expected: usize,
        /// Number of inputs found.
        actual: usize,
    },

    /// The tx does not have the expected number of outputs.
    #[error("expected {expected} outputs, found {actual}")]
    WrongOutputCount {
        /// Required number of outputs.
        expected: usize,
        /// Number of outputs found.
        actual: usize,
    },

    /// The tx spends a different outpoint than expected.
    #[error("tx spends {actual}, expected {expected}")]
    WrongInput {
        /// The outpoint that must be spent.
        expected: OutPoint,
        /// The outpoint actually spent.
        actual: OutPoint,
    },

    /// The tx has an absolute locktime.
    #[error("tx must not be timelocked")]
    NonZeroLockTime,

    /// The spent value cannot cover the outputs and fees.
    #[error("value {value} cannot cover {required}")]
    InsufficientValue {
        /// The value being spent.
        value: Amount,
        /// The amount the tx must pay out, including fees.
        required: Amount,
    },

    /// A delegation must be secured by at least one finality provider.
    #[error("no finality provider keys")]
    NoFinalityProviders,

    /// A key appears more than once among the staker and provider keys.
    #[error("key {0} is used more than once")]
    DuplicateKey(XOnlyPublicKey),

    /// The key is not one of the delegation's finality providers.
    #[error("{0} is not a finality provider of this delegation")]
    UnknownProvider(XOnlyPublicKey),

    /// Fewer covenant signatures than the quorum are available.
    #[error("{available} covenant signatures available, {quorum} required")]
    InsufficientCovenantSigs {
        /// Number of usable signatures.
        available: usize,
        /// Required number of signatures.
        quorum: u32,
    },

    /// A signature does not verify.
    #[error("invalid signature by {0}")]
    InvalidSignature(XOnlyPublicKey),

    /// The signed tx is not the tx the signatures were made for.
    #[error("signed tx does not match the expected tx")]
    TxMismatch,

    /// The witness does not have the layout of the expected spend path.
    #[error("malformed witness: {0}")]
    MalformedWitness(String),

    /// A covenant signature could not be completed.
    #[error("covenant: {0}")]
    Covenant(#[from] CovenantError),

    /// Building the taproot output or a sighash failed.
    #[error("tx builder: {0}")]
    TxBuilder(#[from] TxBuilderError),
}

/// Wrapper type for results that can fail with a [`TxGraphError`].
pub type TxGraphResult<T> = Result<T, TxGraphError>;
