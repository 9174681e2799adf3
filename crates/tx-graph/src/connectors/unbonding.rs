//! The unbonding output.

use bitcoin::{Amount, Network, ScriptBuf};

use crate::{
    connectors::{Connector, SlashableConnector},
    keys::StakingKeys,
    scripts::{slashing_path_script, timelock_script},
};

/// The output an unbonding tx moves the stake into.
///
/// It stays slashable until the staker's shorter `unbonding_time` timelock expires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnbondingConnector {
    network: Network,
    keys: StakingKeys,
    unbonding_time: u16,
    value: Amount,
}

impl UnbondingConnector {
    /// Index of the timelock leaf.
    pub const TIMELOCK_LEAF: usize = 0;

    /// Creates a new unbonding connector.
    pub const fn new(
        network: Network,
        keys: StakingKeys,
        unbonding_time: u16,
        value: Amount,
    ) -> Self {
        Self {
            network,
            keys,
            unbonding_time,
            value,
        }
    }
}

impl Connector for UnbondingConnector {
    fn network(&self) -> Network {
        self.network
    }

    fn leaf_scripts(&self) -> Vec<ScriptBuf> {
        vec![
            timelock_script(self.keys.staker_pk(), self.unbonding_time),
            slashing_path_script(&self.keys),
        ]
    }

    fn value(&self) -> Amount {
        self.value
    }
}

impl SlashableConnector for UnbondingConnector {
    const SLASHING_LEAF: usize = 1;

    fn keys(&self) -> &StakingKeys {
        &self.keys
    }

    fn timelock(&self) -> u16 {
        self.unbonding_time
    }
}
