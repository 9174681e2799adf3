//! Provides some common, standalone utilities and wrappers over [`bitcoin`] to create taproot
//! addresses and script-path sighashes.

use bitcoin::{
    hashes::Hash,
    key::UntweakedPublicKey,
    secp256k1::SECP256K1,
    sighash::{Prevouts, SighashCache},
    taproot::{LeafVersion, TaprootBuilder, TaprootSpendInfo},
    Address, Network, ScriptBuf, TapLeafHash, TapSighashType, Transaction, TxOut,
};
use secp256k1::Message;

use crate::{
    constants::UNSPENDABLE_INTERNAL_KEY,
    errors::{TxBuilderError, TxBuilderResult},
};

/// Different spending paths for a taproot.
///
/// It can be a key path spend, a script path spend or both.
#[derive(Debug, Clone)]
pub enum SpendPath<'path> {
    /// Key path spend that requires just an untweaked (internal) public key.
    KeySpend {
        /// The internal key used to construct the taproot.
        internal_key: UntweakedPublicKey,
    },
    /// Script path spend that only allows spending via scripts in the taproot tree, with the
    /// internal key being the [`static@UNSPENDABLE_INTERNAL_KEY`].
    ScriptSpend {
        /// The scripts that live in the leaves of the taproot tree.
        scripts: &'path [ScriptBuf],
    },
    /// Allows spending via either a provided internal key or via scripts in the taproot tree.
    Both {
        /// The internal key used to construct the taproot.
        internal_key: UntweakedPublicKey,

        /// The scripts that live in the leaves of the taproot tree.
        scripts: &'path [ScriptBuf],
    },
}

/// Create a taproot address for the given `scripts` and `internal_key`.
///
/// # Errors
///
/// If the scripts is empty in [`SpendPath::ScriptSpend`].
pub fn create_taproot_addr(
    network: Network,
    spend_path: SpendPath<'_>,
) -> TxBuilderResult<(Address, TaprootSpendInfo)> {
    match spend_path {
        SpendPath::KeySpend { internal_key } => build_taptree(internal_key, network, &[]),
        SpendPath::ScriptSpend { scripts } => {
            if scripts.is_empty() {
                return Err(TxBuilderError::EmptyTapscript);
            }

            build_taptree(*UNSPENDABLE_INTERNAL_KEY, network, scripts)
        }
        SpendPath::Both {
            internal_key,
            scripts,
        } => build_taptree(internal_key, network, scripts),
    }
}

/// Constructs the taptree for the given scripts.
///
/// Leaves are packed into the shallowest tree that fits them. When the number of scripts is not
/// a power of two, the trailing scripts sit one level above the deepest level. With three
/// scripts, the first two are at depth 2 and the last one at depth 1:
///
/// ```text
///          [Root]
///         /      \
///    [Hash 0]     S2
///    /     \
///   S0     S1
/// ```
fn build_taptree(
    internal_key: UntweakedPublicKey,
    network: Network,
    scripts: &[ScriptBuf],
) -> TxBuilderResult<(Address, TaprootSpendInfo)> {
    let mut taproot_builder = TaprootBuilder::new();

    let num_scripts = scripts.len();

    // 0 or 1 scripts fit at the root; otherwise the depth is ceil(log2(n)).
    let max_depth = if num_scripts > 1 {
        (num_scripts - 1).ilog2() + 1
    } else {
        0
    };

    let max_num_scripts = 2usize.pow(max_depth);

    let num_penultimate_scripts = max_num_scripts.saturating_sub(num_scripts);
    let num_deepest_scripts = num_scripts.saturating_sub(num_penultimate_scripts);

    for (script_idx, script) in scripts.iter().enumerate() {
        let depth = if script_idx < num_deepest_scripts {
            max_depth as u8
        } else {
            (max_depth - 1) as u8
        };

        taproot_builder = taproot_builder.add_leaf(depth, script.clone())?;
    }

    let spend_info = taproot_builder.finalize(SECP256K1, internal_key)?;

    let merkle_root = spend_info.merkle_root();

    Ok((
        Address::p2tr(SECP256K1, internal_key, merkle_root, network),
        spend_info,
    ))
}

/// Generate a sighash message for a taproot `script` spending path at the `input_index` of
/// all `prevouts`.
pub fn create_script_spend_hash(
    sighash_cache: &mut SighashCache<&Transaction>,
    script: &ScriptBuf,
    prevouts: Prevouts<'_, TxOut>,
    sighash_type: TapSighashType,
    input_index: usize,
) -> TxBuilderResult<Message> {
    let leaf_hash = TapLeafHash::from_script(script, LeafVersion::TapScript);

    let sighash = sighash_cache.taproot_script_spend_signature_hash(
        input_index,
        &prevouts,
        leaf_hash,
        sighash_type,
    )?;

    Ok(Message::from_digest(sighash.to_byte_array()))
}
