//! Scaffolding for the unsigned txs of a delegation.
//!
//! Pre-signed txs are never replaced, so their inputs opt out of both RBF and relative
//! timelocks.

use bitcoin::{
    absolute::LockTime, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Witness,
};

/// Assembles a version 2 tx without an absolute locktime.
pub fn create_tx(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    }
}

/// Turns each outpoint into a final, unsigned input.
pub fn create_tx_ins(outpoints: impl IntoIterator<Item = OutPoint>) -> Vec<TxIn> {
    outpoints
        .into_iter()
        .map(|previous_output| TxIn {
            previous_output,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        })
        .collect()
}

/// Pairs each script with the value it receives.
pub fn create_tx_outs(outputs: impl IntoIterator<Item = (ScriptBuf, Amount)>) -> Vec<TxOut> {
    outputs
        .into_iter()
        .map(|(script_pubkey, value)| TxOut {
            value,
            script_pubkey,
        })
        .collect()
}
