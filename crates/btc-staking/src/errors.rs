//! Errors raised while executing staking messages and block hooks.

use bitcoin::{Amount, BlockHash, Txid};
use btc_staking_covenant::CovenantError;
use btc_staking_db::DbError;
use btc_staking_epoching::EpochingError;
use btc_staking_finality::FinalityError;
use btc_staking_light_client::HeaderError;
use btc_staking_params::ParamsError;
use btc_staking_primitives::types::BlockHeight;
use btc_staking_tx_graph::errors::TxGraphError;
use secp256k1::XOnlyPublicKey;
use thiserror::Error;

use crate::types::DelegationState;

/// Errors that can occur while processing a block.
///
/// Every variant except the fatal ones is a rejection of the offending message: it leaves the
/// state exactly as it was before the message.
#[derive(Debug, Error)]
pub enum StakingError {
    /// The input could not be decoded or is structurally invalid.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A transaction does not match what the delegation's keys and parameters derive.
    #[error("tx graph: {0}")]
    TxGraph(#[from] TxGraphError),

    /// Not enough covenant members have signed yet.
    ///
    /// The delegation is left as is and the message can be retried once more signatures arrive.
    #[error("covenant quorum not reached: {have} of {need} signatures")]
    InsufficientQuorum {
        /// Number of members with valid signatures.
        have: usize,
        /// The quorum.
        need: u32,
    },

    /// The header chain rejected a header or failed.
    #[error("header chain: {0}")]
    Header(#[from] HeaderError),

    /// Finality rejected a vote or commitment or failed.
    #[error("finality: {0}")]
    Finality(#[from] FinalityError),

    /// Epoching failed.
    #[error("epoching: {0}")]
    Epoching(#[from] EpochingError),

    /// The covenant committee of a delegation is invalid.
    #[error("covenant: {0}")]
    Covenant(#[from] CovenantError),

    /// The configured parameters are invalid.
    #[error("params: {0}")]
    Params(#[from] ParamsError),

    /// The store failed.
    #[error("db: {0}")]
    Db(#[from] DbError),

    /// A provider with this key is already registered.
    #[error("finality provider {0} already exists")]
    DuplicateProvider(XOnlyPublicKey),

    /// No provider is registered under this key.
    #[error("finality provider {0} does not exist")]
    UnknownProvider(XOnlyPublicKey),

    /// The provider has been slashed.
    #[error("finality provider {0} is slashed")]
    ProviderSlashed(XOnlyPublicKey),

    /// The proof of possession does not verify.
    #[error("invalid proof of possession for {0}")]
    InvalidPop(XOnlyPublicKey),

    /// The staked value is outside the allowed range.
    #[error("staking value {value} is outside [{min}, {max}]")]
    StakingValueOutOfRange {
        /// The staked value.
        value: Amount,
        /// Smallest allowed value.
        min: Amount,
        /// Largest allowed value.
        max: Amount,
    },

    /// The staking timelock is outside the allowed range.
    #[error("staking time {time} is outside [{min}, {max}]")]
    StakingTimeOutOfRange {
        /// The requested timelock.
        time: u16,
        /// Shortest allowed timelock.
        min: u16,
        /// Longest allowed timelock.
        max: u16,
    },

    /// A delegation with this staking tx already exists.
    #[error("delegation {0} already exists")]
    DuplicateDelegation(Txid),

    /// No delegation has this staking tx.
    #[error("delegation {0} does not exist")]
    UnknownDelegation(Txid),

    /// The delegation cannot take this message in its current state.
    #[error("delegation {staking_txid} is {state}")]
    InvalidDelegationState {
        /// The delegation.
        staking_txid: Txid,
        /// Its current state.
        state: DelegationState,
    },

    /// The key is not part of the delegation's covenant committee.
    #[error("{0} is not a covenant member of this delegation")]
    NotCovenantMember(XOnlyPublicKey),

    /// The member's signatures for this delegation are already recorded.
    #[error("covenant member {member} already signed delegation {staking_txid}")]
    DuplicateCovenantSigs {
        /// The delegation.
        staking_txid: Txid,
        /// The member.
        member: XOnlyPublicKey,
    },

    /// A covenant signature does not verify.
    #[error("invalid covenant signature by {0}")]
    InvalidCovenantSig(XOnlyPublicKey),

    /// The inclusion proof does not place the tx in a canonical block.
    #[error("tx {0} is not included in a canonical block")]
    InclusionProofInvalid(Txid),

    /// The block including the tx is not deep enough.
    #[error("block {block_hash} including {txid} is not confirmed")]
    NotConfirmed {
        /// The included tx.
        txid: Txid,
        /// The including block.
        block_hash: BlockHash,
    },

    /// The host block voted on has not been indexed.
    #[error("no indexed block at height {0}")]
    BlockNotIndexed(BlockHeight),

    /// The provider has no voting power at the height voted on.
    #[error("finality provider {fp_pk} has no voting power at height {height}")]
    NoVotingPower {
        /// The provider.
        fp_pk: XOnlyPublicKey,
        /// The height voted on.
        height: BlockHeight,
    },

    /// A message or end-of-block hook arrived outside a block.
    #[error("no block is open")]
    NoOpenBlock,

    /// A block does not directly follow the last block.
    #[error("block at height {0} does not follow the last block")]
    NonSequentialHeight(BlockHeight),

    /// A block was started while another one is open.
    #[error("block {0} is still open")]
    BlockAlreadyOpen(BlockHeight),

    /// An internal invariant is violated.
    #[error("invariant violated: {0}")]
    Fatal(String),
}

impl StakingError {
    /// Returns `true` if the error indicates corrupted state rather than bad input.
    ///
    /// A fatal error aborts the whole block.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) | Self::Db(_) => true,
            Self::Header(e) => e.is_fatal(),
            Self::Finality(e) => e.is_fatal(),
            Self::Epoching(EpochingError::Db(_)) => true,
            _ => false,
        }
    }

    /// Returns `true` if resubmitting the message later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientQuorum { .. })
    }
}

/// Wrapper type for results that can fail with a [`StakingError`].
pub type StakingResult<T> = Result<T, StakingError>;
