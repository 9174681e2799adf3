//! Parameters that govern BTC delegations: the covenant committee, slashing terms, timelocks and
//! the confirmation depth used for activation.
//!
//! A delegation copies the parameters that affect its scripts at creation time, so changing these
//! only affects delegations created afterwards.

use std::{collections::BTreeSet, str::FromStr};

use bitcoin::{opcodes::all::OP_RETURN, script::Builder, Amount, Network, ScriptBuf, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::{
    default::{
        CONFIRMATION_DEPTH, COVENANT_PKS, COVENANT_QUORUM, MAX_STAKING_TIME, MAX_STAKING_VALUE,
        MIN_STAKING_TIME, MIN_STAKING_VALUE, NETWORK, SLASHING_RATE_BPS, SLASHING_TX_FEE,
        UNBONDING_FEE, UNBONDING_TIME,
    },
    errors::{ParamsError, ParamsResult},
    types::SlashingRate,
};

/// The consensus parameters for BTC staking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// The bitcoin network the staking scripts are derived for.
    pub network: Network,

    /// The covenant committee members.
    pub covenant_pks: Vec<XOnlyPublicKey>,

    /// Number of covenant signatures needed to authorize a slashing or unbonding spend.
    pub covenant_quorum: u32,

    /// Script of the output that receives the slashed portion of a stake.
    pub slashing_pk_script: ScriptBuf,

    /// Portion of the stake that is slashed.
    pub slashing_rate: SlashingRate,

    /// Exact fee a slashing transaction pays.
    pub slashing_tx_fee: Amount,

    /// Exact fee an unbonding transaction pays.
    pub unbonding_fee: Amount,

    /// Relative timelock, in blocks, of the unbonding output and of slashing change outputs.
    pub unbonding_time: u16,

    /// Minimum relative timelock of a staking output.
    pub min_staking_time: u16,

    /// Maximum relative timelock of a staking output.
    pub max_staking_time: u16,

    /// Minimum value of a staking output.
    pub min_staking_value: Amount,

    /// Maximum value of a staking output.
    pub max_staking_value: Amount,

    /// Number of blocks on top of a transaction's block before it counts as confirmed.
    pub confirmation_depth: u64,
}

impl StakingParams {
    /// Validates the parameters.
    pub fn validate(&self) -> ParamsResult<()> {
        if self.covenant_pks.is_empty() {
            return Err(ParamsError::EmptyCovenantCommittee);
        }

        let mut seen = BTreeSet::new();
        for pk in &self.covenant_pks {
            if !seen.insert(*pk) {
                return Err(ParamsError::DuplicateCovenantKey(*pk));
            }
        }

        if self.covenant_quorum == 0 || self.covenant_quorum as usize > self.covenant_pks.len() {
            return Err(ParamsError::InvalidQuorum {
                quorum: self.covenant_quorum,
                size: self.covenant_pks.len(),
            });
        }

        if self.min_staking_time == 0 || self.min_staking_time > self.max_staking_time {
            return Err(ParamsError::InvalidStakingTimeRange {
                min: self.min_staking_time,
                max: self.max_staking_time,
            });
        }

        if self.min_staking_value == Amount::ZERO || self.min_staking_value > self.max_staking_value
        {
            return Err(ParamsError::InvalidStakingValueRange {
                min: self.min_staking_value.to_sat(),
                max: self.max_staking_value.to_sat(),
            });
        }

        if self.unbonding_time == 0 || self.unbonding_time >= self.min_staking_time {
            return Err(ParamsError::InvalidUnbondingTime {
                unbonding_time: self.unbonding_time,
                min_staking_time: self.min_staking_time,
            });
        }

        let fees = self
            .unbonding_fee
            .checked_add(self.slashing_tx_fee)
            .ok_or(ParamsError::FeesExceedStake)?;
        if fees >= self.min_staking_value {
            return Err(ParamsError::FeesExceedStake);
        }

        if self.confirmation_depth == 0 {
            return Err(ParamsError::Zero("confirmation_depth"));
        }

        Ok(())
    }

    /// Returns the covenant committee sorted and deduplicated, as used in scripts.
    pub fn sorted_covenant_pks(&self) -> Vec<XOnlyPublicKey> {
        self.covenant_pks
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for StakingParams {
    fn default() -> Self {
        let covenant_pks = COVENANT_PKS
            .iter()
            .map(|pk| XOnlyPublicKey::from_str(pk).expect("default covenant keys must be valid"))
            .collect();

        Self {
            network: NETWORK,
            covenant_pks,
            covenant_quorum: COVENANT_QUORUM,
            slashing_pk_script: Builder::new().push_opcode(OP_RETURN).into_script(),
            slashing_rate: SlashingRate::try_from(SLASHING_RATE_BPS)
                .expect("default slashing rate must be valid"),
            slashing_tx_fee: SLASHING_TX_FEE,
            unbonding_fee: UNBONDING_FEE,
            unbonding_time: UNBONDING_TIME,
            min_staking_time: MIN_STAKING_TIME,
            max_staking_time: MAX_STAKING_TIME,
            min_staking_value: MIN_STAKING_VALUE,
            max_staking_value: MAX_STAKING_VALUE,
            confirmation_depth: CONFIRMATION_DEPTH,
        }
    }
}
