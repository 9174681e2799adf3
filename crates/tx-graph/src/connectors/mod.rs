//! Taproot outputs of the staking transaction family.

pub mod change;
pub mod prelude;
pub mod staking;
pub mod unbonding;

use bitcoin::{
    taproot::{ControlBlock, LeafVersion, TaprootSpendInfo},
    Address, Amount, Network, ScriptBuf, TxOut,
};
use btc_staking_primitives::scripts::prelude::{create_taproot_addr, SpendPath};

use crate::keys::StakingKeys;

/// A taproot output that is only spendable through its leaf scripts.
pub trait Connector {
    /// Returns the network of the connector.
    fn network(&self) -> Network;

    /// Generates the leaf scripts of the connector, in tree order.
    fn leaf_scripts(&self) -> Vec<ScriptBuf>;

    /// Returns the value of the connector.
    fn value(&self) -> Amount;

    /// Generates the address and spend info of the connector.
    fn taproot(&self) -> (Address, TaprootSpendInfo) {
        // leaf scripts are never empty and the tree shape only depends on their count
        create_taproot_addr(
            self.network(),
            SpendPath::ScriptSpend {
                scripts: self.leaf_scripts().as_slice(),
            },
        )
        .expect("tap tree is valid")
    }

    /// Generates the address of the connector.
    fn address(&self) -> Address {
        self.taproot().0
    }

    /// Generates the script pubkey of the connector.
    fn script_pubkey(&self) -> ScriptBuf {
        self.address().script_pubkey()
    }

    /// Generates the transaction output of the connector.
    fn tx_out(&self) -> TxOut {
        TxOut {
            value: self.value(),
            script_pubkey: self.script_pubkey(),
        }
    }

    /// Returns the leaf script at `leaf_index` along with its control block.
    ///
    /// # Panics
    ///
    /// If `leaf_index` is out of bounds. Connectors expose their leaf indices as constants.
    fn leaf(&self, leaf_index: usize) -> (ScriptBuf, ControlBlock) {
        let mut leaf_scripts = self.leaf_scripts();
        assert!(
            leaf_index < leaf_scripts.len(),
            "leaf index should be within bounds"
        );
        let leaf_script = leaf_scripts.swap_remove(leaf_index);
        let control_block = self
            .taproot()
            .1
            .control_block(&(leaf_script.clone(), LeafVersion::TapScript))
            .expect("leaf script exists");

        (leaf_script, control_block)
    }
}

/// A connector with a slashing leaf guarded by the delegation's keys.
pub trait SlashableConnector: Connector {
    /// Index of the slashing leaf.
    const SLASHING_LEAF: usize;

    /// Returns the keys guarding the output.
    fn keys(&self) -> &StakingKeys;

    /// Returns the relative timelock of the staker's own spend path.
    fn timelock(&self) -> u16;
}
