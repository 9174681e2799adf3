//! The staking output.

use bitcoin::{Amount, Network, ScriptBuf};

use crate::{
    connectors::{Connector, SlashableConnector},
    keys::StakingKeys,
    scripts::{slashing_path_script, timelock_script, unbonding_path_script},
};

/// The output that locks a delegation's stake.
///
/// Tap tree:
/// 1. (depth 2) staker after `staking_time` blocks,
/// 2. (depth 2) staker + covenant quorum, into the unbonding tx,
/// 3. (depth 1) staker + one provider + covenant quorum, into the slashing tx.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StakingConnector {
    network: Network,
    keys: StakingKeys,
    staking_time: u16,
    value: Amount,
}

impl StakingConnector {
    /// Index of the timelock leaf.
    pub const TIMELOCK_LEAF: usize = 0;
    /// Index of the unbonding leaf.
    pub const UNBONDING_LEAF: usize = 1;

    /// Creates a new staking connector.
    pub const fn new(network: Network, keys: StakingKeys, staking_time: u16, value: Amount) -> Self {
        Self {
            network,
            keys,
            staking_time,
            value,
        }
    }
}

impl Connector for StakingConnector {
    fn network(&self) -> Network {
        self.network
    }

    fn leaf_scripts(&self) -> Vec<ScriptBuf> {
        vec![
            timelock_script(self.keys.staker_pk(), self.staking_time),
            unbonding_path_script(&self.keys),
            slashing_path_script(&self.keys),
        ]
    }

    fn value(&self) -> Amount {
        self.value
    }
}

impl SlashableConnector for StakingConnector {
    const SLASHING_LEAF: usize = 2;

    fn keys(&self) -> &StakingKeys {
        &self.keys
    }

    fn timelock(&self) -> u16 {
        self.staking_time
    }
}
