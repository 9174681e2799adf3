//! The change output of a slashing tx.

use bitcoin::{Amount, Network, ScriptBuf};
use secp256k1::XOnlyPublicKey;

use crate::{connectors::Connector, scripts::timelock_script};

/// Returns what is left of a slashed stake to the staker after `unbonding_time` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlashingChangeConnector {
    network: Network,
    staker_pk: XOnlyPublicKey,
    unbonding_time: u16,
    value: Amount,
}

impl SlashingChangeConnector {
    /// Creates a new change connector.
    pub const fn new(
        network: Network,
        staker_pk: XOnlyPublicKey,
        unbonding_time: u16,
        value: Amount,
    ) -> Self {
        Self {
            network,
            staker_pk,
            unbonding_time,
            value,
        }
    }
}

impl Connector for SlashingChangeConnector {
    fn network(&self) -> Network {
        self.network
    }

    fn leaf_scripts(&self) -> Vec<ScriptBuf> {
        vec![timelock_script(&self.staker_pk, self.unbonding_time)]
    }

    fn value(&self) -> Amount {
        self.value
    }
}
