//! The staking transaction.
//!
//! Stakers fund staking transactions from their own wallets, so the only thing that is checked is
//! the staking output itself.

use bitcoin::{OutPoint, Transaction};
use btc_staking_primitives::scripts::prelude::{create_tx, create_tx_ins};
use tracing::trace;

use crate::{
    connectors::{staking::StakingConnector, Connector},
    errors::{TxGraphError, TxGraphResult},
};

/// Verifies that output `vout` of `tx` is the staking output `expected` describes.
///
/// # Errors
///
/// [`TxGraphError::WrongOutputIndex`] if the output does not exist,
/// [`TxGraphError::ScriptMismatch`] if it pays to any other script and
/// [`TxGraphError::WrongAmount`] if it carries any other value.
pub fn verify_staking_tx(
    tx: &Transaction,
    vout: u32,
    expected: &StakingConnector,
) -> TxGraphResult<()> {
    let output = tx
        .output
        .get(vout as usize)
        .ok_or(TxGraphError::WrongOutputIndex {
            index: vout,
            num_outputs: tx.output.len(),
        })?;

    let expected = expected.tx_out();
    if output.script_pubkey != expected.script_pubkey {
        trace!(txid = %tx.compute_txid(), %vout, "staking output script mismatch");
        return Err(TxGraphError::ScriptMismatch { vout });
    }

    if output.value != expected.value {
        return Err(TxGraphError::WrongAmount {
            vout,
            expected: expected.value,
            actual: output.value,
        });
    }

    Ok(())
}

/// Creates an unsigned staking tx that spends `funding` into the staking output at index 0.
pub fn create_staking_tx(
    funding: impl IntoIterator<Item = OutPoint>,
    connector: &StakingConnector,
) -> Transaction {
    create_tx(create_tx_ins(funding), vec![connector.tx_out()])
}
