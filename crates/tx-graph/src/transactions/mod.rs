//! The staking, unbonding and slashing transactions.

pub mod prelude;
pub mod slashing;
pub mod staking;
pub mod unbonding;

use std::collections::BTreeMap;

use bitcoin::{
    sighash::{Prevouts, SighashCache},
    ScriptBuf, TapSighashType, Transaction, TxOut,
};
use btc_staking_primitives::scripts::prelude::create_script_spend_hash;
use secp256k1::{schnorr, Message, XOnlyPublicKey, SECP256K1};

use crate::errors::{TxGraphError, TxGraphResult};

/// Computes the sighash of the single input of `tx` spending `prevout` through `leaf_script`.
pub(crate) fn leaf_sighash(
    tx: &Transaction,
    prevout: &TxOut,
    leaf_script: &ScriptBuf,
) -> TxGraphResult<Message> {
    let prevouts = [prevout.clone()];

    Ok(create_script_spend_hash(
        &mut SighashCache::new(tx),
        leaf_script,
        Prevouts::All(&prevouts),
        TapSighashType::Default,
        0,
    )?)
}

/// Checks a BIP340 signature by `pk` over `msg`.
pub fn verify_schnorr_sig(
    pk: &XOnlyPublicKey,
    msg: &Message,
    sig: &schnorr::Signature,
) -> TxGraphResult<()> {
    SECP256K1
        .verify_schnorr(sig, msg, pk)
        .map_err(|_| TxGraphError::InvalidSignature(*pk))
}

/// Lays out the stack items a `CHECKSIG`/`CHECKSIGADD` multisig over `sorted_keys` consumes.
///
/// Items are in witness order (the first key's item ends up on top). Keys without a signature
/// get an empty item.
pub(crate) fn multisig_witness(
    sorted_keys: &[XOnlyPublicKey],
    sigs: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
) -> Vec<Vec<u8>> {
    sorted_keys
        .iter()
        .rev()
        .map(|pk| {
            sigs.get(pk)
                .map(|sig| sig.serialize().to_vec())
                .unwrap_or_default()
        })
        .collect()
}

/// Keeps the signatures of the first `quorum` signers in key order.
///
/// A multisig fails if more than the threshold signs, so surplus signatures must be dropped.
pub(crate) fn select_quorum(
    sorted_keys: &[XOnlyPublicKey],
    quorum: u32,
    sigs: &BTreeMap<XOnlyPublicKey, schnorr::Signature>,
) -> TxGraphResult<BTreeMap<XOnlyPublicKey, schnorr::Signature>> {
    let selected = sorted_keys
        .iter()
        .filter_map(|pk| sigs.get(pk).map(|sig| (*pk, *sig)))
        .take(quorum as usize)
        .collect::<BTreeMap<_, _>>();

    if selected.len() < quorum as usize {
        return Err(TxGraphError::InsufficientCovenantSigs {
            available: selected.len(),
            quorum,
        });
    }

    Ok(selected)
}
