//! Messages the host delivers to the staking core.

use bitcoin::{block::Header, Amount, Transaction, Txid};
use btc_staking_covenant::AdaptorSignature;
use btc_staking_finality::{MsgAddFinalitySig, MsgCommitPubRand};
use btc_staking_light_client::TxInclusionProof;
use btc_staking_params::types::CommissionRate;
use btc_staking_primitives::pop::ProofOfPossession;
use secp256k1::{schnorr, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::errors::{StakingError, StakingResult};

/// Registers a finality provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateFinalityProvider {
    /// Host-chain address of the operator.
    pub addr: String,

    /// The provider's BTC key.
    pub btc_pk: XOnlyPublicKey,

    /// Proof that the operator controls `btc_pk`.
    pub pop: ProofOfPossession,

    /// Commission charged on rewards.
    pub commission: CommissionRate,
}

/// Creates a delegation from a staking tx included in the BTC chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateBtcDelegation {
    /// Host-chain address of the staker.
    pub staker_addr: String,

    /// The staker's BTC key.
    pub staker_pk: XOnlyPublicKey,

    /// Proof that the staker controls `staker_pk`.
    pub pop: ProofOfPossession,

    /// The providers to delegate to.
    pub fp_pks: Vec<XOnlyPublicKey>,

    /// Timelock of the staking output.
    pub staking_time: u16,

    /// Value of the staking output.
    pub staking_value: Amount,

    /// The staking tx.
    pub staking_tx: Transaction,

    /// Index of the staking output.
    pub staking_output_index: u32,

    /// Proof that `staking_tx` is in a known block.
    pub inclusion_proof: TxInclusionProof,

    /// Slashing tx of the staking output.
    pub slashing_tx: Transaction,

    /// The staker's signature over `slashing_tx`.
    pub delegator_slashing_sig: schnorr::Signature,

    /// The unbonding tx.
    pub unbonding_tx: Transaction,

    /// Slashing tx of the unbonding output.
    pub unbonding_slashing_tx: Transaction,

    /// The staker's signature over `unbonding_slashing_tx`.
    pub delegator_unbonding_slashing_sig: schnorr::Signature,
}

/// One covenant member's signatures for a delegation.
///
/// Both adaptor signature lists carry exactly one entry per provider of the delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddCovenantSigs {
    /// The signing member.
    pub covenant_pk: XOnlyPublicKey,

    /// The delegation.
    pub staking_txid: Txid,

    /// Adaptor signatures over the staking-output slashing tx.
    #[serde(with = "btc_staking_covenant::codec::provider_pairs")]
    pub slashing_sigs: Vec<(XOnlyPublicKey, AdaptorSignature)>,

    /// Adaptor signatures over the unbonding-output slashing tx.
    #[serde(with = "btc_staking_covenant::codec::provider_pairs")]
    pub unbonding_slashing_sigs: Vec<(XOnlyPublicKey, AdaptorSignature)>,

    /// Signature over the unbonding tx.
    pub unbonding_sig: schnorr::Signature,
}

/// Requests unbonding of a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBtcUndelegate {
    /// The delegation.
    pub staking_txid: Txid,

    /// The staker's signature over the unbonding tx.
    pub unbonding_sig: schnorr::Signature,
}

/// Reports a slashing tx that made it on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgReportSlashingTx {
    /// The slashed delegation.
    pub staking_txid: Txid,

    /// The signed slashing tx, of either the staking or the unbonding output.
    pub slashing_tx: Transaction,

    /// Proof that `slashing_tx` is in a confirmed block.
    pub inclusion_proof: TxInclusionProof,
}

/// Releases a provider from jail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnjailFinalityProvider {
    /// The provider.
    pub fp_pk: XOnlyPublicKey,
}

/// Extends the BTC header chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInsertHeaders {
    /// Headers in parent-first order.
    pub headers: Vec<Header>,
}

/// Any message the staking core accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    /// See [`MsgCreateFinalityProvider`].
    CreateFinalityProvider(MsgCreateFinalityProvider),

    /// See [`MsgCreateBtcDelegation`].
    CreateBtcDelegation(Box<MsgCreateBtcDelegation>),

    /// See [`MsgAddCovenantSigs`].
    AddCovenantSigs(Box<MsgAddCovenantSigs>),

    /// See [`MsgBtcUndelegate`].
    BtcUndelegate(MsgBtcUndelegate),

    /// See [`MsgReportSlashingTx`].
    ReportSlashingTx(Box<MsgReportSlashingTx>),

    /// See [`MsgCommitPubRand`].
    CommitPubRand(MsgCommitPubRand),

    /// See [`MsgAddFinalitySig`].
    AddFinalitySig(MsgAddFinalitySig),

    /// See [`MsgUnjailFinalityProvider`].
    UnjailFinalityProvider(MsgUnjailFinalityProvider),

    /// See [`MsgInsertHeaders`].
    InsertHeaders(MsgInsertHeaders),
}

impl Msg {
    /// Encodes the message for transport.
    pub fn encode(&self) -> StakingResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StakingError::MalformedInput(e.to_string()))
    }

    /// Decodes a message received from the host.
    pub fn decode(raw: &[u8]) -> StakingResult<Self> {
        bincode::deserialize(raw).map_err(|e| StakingError::MalformedInput(e.to_string()))
    }

    /// Returns a short name of the message kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateFinalityProvider(_) => "create_finality_provider",
            Self::CreateBtcDelegation(_) => "create_btc_delegation",
            Self::AddCovenantSigs(_) => "add_covenant_sigs",
            Self::BtcUndelegate(_) => "btc_undelegate",
            Self::ReportSlashingTx(_) => "report_slashing_tx",
            Self::CommitPubRand(_) => "commit_pub_rand",
            Self::AddFinalitySig(_) => "add_finality_sig",
            Self::UnjailFinalityProvider(_) => "unjail_finality_provider",
            Self::InsertHeaders(_) => "insert_headers",
        }
    }
}

impl From<MsgCreateFinalityProvider> for Msg {
    fn from(msg: MsgCreateFinalityProvider) -> Self {
        Self::CreateFinalityProvider(msg)
    }
}

impl From<MsgCreateBtcDelegation> for Msg {
    fn from(msg: MsgCreateBtcDelegation) -> Self {
        Self::CreateBtcDelegation(Box::new(msg))
    }
}

impl From<MsgAddCovenantSigs> for Msg {
    fn from(msg: MsgAddCovenantSigs) -> Self {
        Self::AddCovenantSigs(Box::new(msg))
    }
}

impl From<MsgBtcUndelegate> for Msg {
    fn from(msg: MsgBtcUndelegate) -> Self {
        Self::BtcUndelegate(msg)
    }
}

impl From<MsgReportSlashingTx> for Msg {
    fn from(msg: MsgReportSlashingTx) -> Self {
        Self::ReportSlashingTx(Box::new(msg))
    }
}

impl From<MsgCommitPubRand> for Msg {
    fn from(msg: MsgCommitPubRand) -> Self {
        Self::CommitPubRand(msg)
    }
}

impl From<MsgAddFinalitySig> for Msg {
    fn from(msg: MsgAddFinalitySig) -> Self {
        Self::AddFinalitySig(msg)
    }
}

impl From<MsgUnjailFinalityProvider> for Msg {
    fn from(msg: MsgUnjailFinalityProvider) -> Self {
        Self::UnjailFinalityProvider(msg)
    }
}

impl From<MsgInsertHeaders> for Msg {
    fn from(msg: MsgInsertHeaders) -> Self {
        Self::InsertHeaders(msg)
    }
}
