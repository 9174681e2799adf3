//! Constants used when deriving staking outputs.

use std::{str::FromStr, sync::LazyLock};

use secp256k1::XOnlyPublicKey;

/// The BIP341 "nothing up my sleeve" point `H`.
///
/// Used as the internal key of every staking-related taproot output so that only the script
/// paths are spendable.
pub static UNSPENDABLE_INTERNAL_KEY: LazyLock<XOnlyPublicKey> = LazyLock::new(|| {
    XOnlyPublicKey::from_str("50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0")
        .expect("NUMS point must be a valid x-only key")
});
