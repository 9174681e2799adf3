//! Finality providers and BTC delegations as they are persisted.

use std::{collections::BTreeMap, fmt};

use bitcoin::{Amount, BlockHash, OutPoint, Transaction, Txid};
use btc_staking_covenant::{count_valid_quorum, AdaptorSignature, CovenantCommittee};
use btc_staking_params::{types::CommissionRate, StakingParams};
use btc_staking_primitives::types::{BitcoinBlockHeight, BlockHeight, BlockTime};
use btc_staking_tx_graph::{
    connectors::prelude::StakingConnector,
    keys::StakingKeys,
    transactions::prelude::{SlashingTx, UnbondingTx},
};
use secp256k1::{schnorr, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::errors::StakingResult;

/// A registered finality provider.
///
/// The BTC key is the identity. Providers are never deleted; jailing and slashing only flag them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityProvider {
    /// The provider's BTC key.
    pub btc_pk: XOnlyPublicKey,

    /// The host-chain address that operates the provider.
    pub addr: String,

    /// Commission charged on rewards.
    pub commission: CommissionRate,

    /// Height at which the provider registered.
    pub registered_height: BlockHeight,

    /// Whether the provider is jailed for missing votes.
    pub jailed: bool,

    /// Block time until which the provider stays jailed.
    pub jailed_until: Option<BlockTime>,

    /// Height at which the provider was slashed, if it was.
    pub slashed_height: Option<BlockHeight>,
}

impl FinalityProvider {
    /// Returns `true` if the provider has been slashed.
    pub const fn is_slashed(&self) -> bool {
        self.slashed_height.is_some()
    }

    /// Returns `true` if the provider may hold voting power.
    pub const fn is_eligible(&self) -> bool {
        !self.jailed && !self.is_slashed()
    }
}

/// Where a delegation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelegationState {
    /// Waiting for a covenant quorum or for its staking tx to be deep enough.
    Pending,

    /// Contributing voting power.
    Active,

    /// The staker requested unbonding.
    Unbonded,

    /// One of its providers was slashed. Terminal.
    Slashed,

    /// The staking timelock elapsed. Terminal.
    Expired,
}

impl DelegationState {
    /// Returns `true` if the delegation can no longer change.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Slashed | Self::Expired)
    }
}

impl fmt::Display for DelegationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Unbonded => "unbonded",
            Self::Slashed => "slashed",
            Self::Expired => "expired",
        };

        f.write_str(state)
    }
}

/// Everything one covenant member signed for a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovenantAdaptorSigs {
    /// Adaptor signatures over the staking-output slashing tx, by the provider key they are
    /// encrypted under.
    #[serde(with = "btc_staking_covenant::codec::by_provider")]
    pub slashing: BTreeMap<XOnlyPublicKey, AdaptorSignature>,

    /// Adaptor signatures over the unbonding-output slashing tx, by provider key.
    #[serde(with = "btc_staking_covenant::codec::by_provider")]
    pub unbonding_slashing: BTreeMap<XOnlyPublicKey, AdaptorSignature>,

    /// Signature over the unbonding tx.
    pub unbonding: schnorr::Signature,
}

/// The pre-signed unbonding path of a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcUndelegation {
    /// The unbonding tx.
    pub unbonding_tx: Transaction,

    /// Timelock of the unbonding output.
    pub unbonding_time: u16,

    /// The slashing tx of the unbonding output.
    pub slashing_tx: Transaction,

    /// The staker's signature over [`Self::slashing_tx`].
    pub delegator_slashing_sig: schnorr::Signature,

    /// The staker's signature over the unbonding tx, once unbonding was requested.
    pub delegator_unbonding_sig: Option<schnorr::Signature>,
}

/// A BTC delegation to one or more finality providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcDelegation {
    /// Host-chain address of the staker.
    pub staker_addr: String,

    /// The staker's BTC key.
    pub staker_pk: XOnlyPublicKey,

    /// The providers the stake is delegated to, sorted.
    pub fp_pks: Vec<XOnlyPublicKey>,

    /// The staking tx.
    pub staking_tx: Transaction,

    /// Index of the staking output in [`Self::staking_tx`].
    pub staking_output_index: u32,

    /// Timelock of the staking output, in blocks.
    pub staking_time: u16,

    /// Value of the staking output.
    pub total_sat: Amount,

    /// Block that includes the staking tx.
    pub inclusion_block: BlockHash,

    /// Height of [`Self::inclusion_block`].
    pub start_height: BitcoinBlockHeight,

    /// Height at which the staking timelock elapses.
    pub end_height: BitcoinBlockHeight,

    /// The slashing tx of the staking output.
    pub slashing_tx: Transaction,

    /// The staker's signature over [`Self::slashing_tx`].
    pub delegator_slashing_sig: schnorr::Signature,

    /// Covenant signatures, by member.
    pub covenant_sigs: BTreeMap<XOnlyPublicKey, CovenantAdaptorSigs>,

    /// The staking parameters in force when the delegation was created.
    pub params: StakingParams,

    /// The unbonding path.
    pub undelegation: BtcUndelegation,

    /// Lifecycle state.
    pub state: DelegationState,
}

impl BtcDelegation {
    /// Returns the id of the delegation.
    pub fn staking_txid(&self) -> Txid {
        self.staking_tx.compute_txid()
    }

    /// Returns the staking output.
    pub fn staking_outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.staking_txid(),
            vout: self.staking_output_index,
        }
    }

    /// Returns the covenant committee the delegation was created with.
    pub fn committee(&self) -> StakingResult<CovenantCommittee> {
        Ok(CovenantCommittee::new(
            self.params.covenant_pks.clone(),
            self.params.covenant_quorum,
        )?)
    }

    /// Returns the keys that lock the stake.
    pub fn keys(&self) -> StakingResult<StakingKeys> {
        Ok(StakingKeys::new(self.staker_pk, self.fp_pks.clone(), self.committee()?)?)
    }

    /// Rebuilds the staking output.
    pub fn staking_connector(&self) -> StakingResult<StakingConnector> {
        Ok(StakingConnector::new(
            self.params.network,
            self.keys()?,
            self.staking_time,
            self.total_sat,
        ))
    }

    /// Rebuilds the slashing tx of the staking output.
    pub fn slashing(&self) -> StakingResult<SlashingTx> {
        Ok(SlashingTx::from_tx(
            self.slashing_tx.clone(),
            &self.staking_connector()?,
            self.staking_outpoint(),
            &self.params,
        )?)
    }

    /// Rebuilds the unbonding tx.
    pub fn unbonding(&self) -> StakingResult<UnbondingTx> {
        Ok(UnbondingTx::from_tx(
            self.undelegation.unbonding_tx.clone(),
            &self.staking_connector()?,
            self.staking_outpoint(),
            &self.params,
        )?)
    }

    /// Rebuilds the slashing tx of the unbonding output.
    pub fn unbonding_slashing(&self) -> StakingResult<SlashingTx> {
        let unbonding = self.unbonding()?;

        Ok(SlashingTx::from_tx(
            self.undelegation.slashing_tx.clone(),
            unbonding.connector(),
            unbonding.unbonding_outpoint(),
            &self.params,
        )?)
    }

    /// Returns the covenant adaptor signatures encrypted under `fp_pk`, by member.
    ///
    /// `unbonding` selects the signatures over the unbonding-output slashing tx.
    pub fn adaptor_sigs_for(
        &self,
        fp_pk: &XOnlyPublicKey,
        unbonding: bool,
    ) -> BTreeMap<XOnlyPublicKey, AdaptorSignature> {
        self.covenant_sigs
            .iter()
            .filter_map(|(member, sigs)| {
                let sigs = if unbonding {
                    &sigs.unbonding_slashing
                } else {
                    &sigs.slashing
                };

                sigs.get(fp_pk).map(|sig| (*member, sig.clone()))
            })
            .collect()
    }

    /// Counts the members whose slashing signatures are valid for every provider.
    ///
    /// Only such members can complete a slashing tx whichever provider equivocates.
    pub fn covenant_quorum_size(&self) -> StakingResult<usize> {
        let committee = self.committee()?;
        let sighash = self.slashing()?.sighash()?;

        let mut min = committee.len();
        for fp_pk in &self.fp_pks {
            let sigs = self.adaptor_sigs_for(fp_pk, false).into_iter().collect::<Vec<_>>();
            min = min.min(count_valid_quorum(&sigs, &committee, &sighash, fp_pk));
        }

        Ok(min)
    }

    /// Returns `true` if a quorum of the committee signed the slashing txs.
    pub fn has_covenant_quorum(&self) -> StakingResult<bool> {
        let quorum = self.params.covenant_quorum as usize;
        if self.covenant_sigs.len() < quorum {
            return Ok(false);
        }

        Ok(self.covenant_quorum_size()? >= quorum)
    }

    /// Returns `true` if the staking timelock has elapsed at BTC height `tip_height`.
    pub const fn is_expired_at(&self, tip_height: BitcoinBlockHeight) -> bool {
        tip_height >= self.end_height
    }

    /// Returns the voting power the delegation grants each of its providers.
    pub fn voting_power(&self) -> u64 {
        match self.state {
            DelegationState::Active => self.total_sat.to_sat(),
            _ => 0,
        }
    }
}
