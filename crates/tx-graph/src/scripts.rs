//! Tapscripts of the staking spend paths.
//!
//! Multisig scripts sort their keys by serialization and use the `CHECKSIG`/`CHECKSIGADD`
//! pattern, so a witness must provide one stack item per key (an empty item for keys that do
//! not sign) in reverse key order.

use bitcoin::{
    opcodes::all::{OP_CHECKSIG, OP_CHECKSIGADD, OP_CHECKSIGVERIFY, OP_CSV, OP_NUMEQUAL, OP_NUMEQUALVERIFY},
    script::Builder,
    ScriptBuf,
};
use secp256k1::XOnlyPublicKey;

use crate::keys::StakingKeys;

/// Spendable by `pk` once the output is `lock_blocks` deep:
/// `<pk> CHECKSIGVERIFY <lock_blocks> CHECKSEQUENCEVERIFY`.
pub fn timelock_script(pk: &XOnlyPublicKey, lock_blocks: u16) -> ScriptBuf {
    Builder::new()
        .push_x_only_key(pk)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(lock_blocks as i64)
        .push_opcode(OP_CSV)
        .into_script()
}

/// `threshold`-of-`keys` multisig.
///
/// A single key degenerates to a plain signature check. With `verify`, the script leaves
/// nothing on the stack so more checks can follow.
///
/// Returns `None` if `keys` is empty or `threshold` is not in `1..=keys.len()`.
pub fn multisig_script(keys: &[XOnlyPublicKey], threshold: u32, verify: bool) -> Option<ScriptBuf> {
    if keys.is_empty() || threshold == 0 || threshold as usize > keys.len() {
        return None;
    }

    Some(push_multisig(Builder::new(), keys, threshold, verify).into_script())
}

/// Staker and covenant quorum; moves the stake into the unbonding output.
pub fn unbonding_path_script(keys: &StakingKeys) -> ScriptBuf {
    let builder = push_single_key(Builder::new(), keys.staker_pk(), true);
    let covenant = keys.covenant();

    push_multisig(builder, covenant.members(), covenant.quorum(), false).into_script()
}

/// Staker, any one finality provider and covenant quorum; spends into the slashing tx.
pub fn slashing_path_script(keys: &StakingKeys) -> ScriptBuf {
    let builder = push_single_key(Builder::new(), keys.staker_pk(), true);
    let builder = push_multisig(builder, keys.fp_pks(), 1, true);
    let covenant = keys.covenant();

    push_multisig(builder, covenant.members(), covenant.quorum(), false).into_script()
}

fn push_single_key(builder: Builder, pk: &XOnlyPublicKey, verify: bool) -> Builder {
    let builder = builder.push_x_only_key(pk);

    if verify {
        builder.push_opcode(OP_CHECKSIGVERIFY)
    } else {
        builder.push_opcode(OP_CHECKSIG)
    }
}

/// Callers guarantee `1 <= threshold <= keys.len()`.
fn push_multisig(builder: Builder, keys: &[XOnlyPublicKey], threshold: u32, verify: bool) -> Builder {
    if keys.len() == 1 {
        return push_single_key(builder, &keys[0], verify);
    }

    let mut sorted = keys.to_vec();
    sorted.sort_by_key(|pk| pk.serialize());

    let mut builder = builder;
    for (i, pk) in sorted.iter().enumerate() {
        builder = builder.push_x_only_key(pk);
        builder = if i == 0 {
            builder.push_opcode(OP_CHECKSIG)
        } else {
            builder.push_opcode(OP_CHECKSIGADD)
        };
    }

    builder = builder.push_int(threshold as i64);
    if verify {
        builder.push_opcode(OP_NUMEQUALVERIFY)
    } else {
        builder.push_opcode(OP_NUMEQUAL)
    }
}
