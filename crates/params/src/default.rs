//! Default values for the staking, finality and epoching parameters.
//!
//! These match a local development network. Production deployments are expected to override
//! them through a config file.

use bitcoin::{Amount, Network};

/// Default network the staking scripts are derived for.
pub(crate) const NETWORK: Network = Network::Regtest;

/// Default covenant committee as hex-encoded x-only public keys.
///
/// These are the x-coordinates of `1·G`, `2·G` and `3·G`, i.e., keys with publicly known secrets.
/// They must never be used outside a development network.
pub(crate) const COVENANT_PKS: [&str; 3] = [
    "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
    "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9",
];

/// Default number of covenant signatures required to authorize a spend.
pub(crate) const COVENANT_QUORUM: u32 = 2;

/// Default slashing rate in basis points (10%).
pub(crate) const SLASHING_RATE_BPS: u16 = 1_000;

/// Default fee that the slashing transaction pays.
pub(crate) const SLASHING_TX_FEE: Amount = Amount::from_sat(1_000);

/// Default fee that the unbonding transaction pays.
pub(crate) const UNBONDING_FEE: Amount = Amount::from_sat(1_000);

/// Default relative timelock, in blocks, of the unbonding output and of slashing change outputs.
pub(crate) const UNBONDING_TIME: u16 = 101;

/// Default minimum relative timelock of a staking output.
pub(crate) const MIN_STAKING_TIME: u16 = 1_000;

/// Default maximum relative timelock of a staking output.
pub(crate) const MAX_STAKING_TIME: u16 = u16::MAX;

/// Default minimum value of a staking output.
pub(crate) const MIN_STAKING_VALUE: Amount = Amount::from_sat(10_000);

/// Default maximum value of a staking output.
pub(crate) const MAX_STAKING_VALUE: Amount = Amount::from_int_btc(10);

/// Default number of blocks that must be built on top of the block containing a staking
/// transaction before the delegation becomes active.
pub(crate) const CONFIRMATION_DEPTH: u64 = 6;

/// Default size of the liveness window, in blocks.
pub(crate) const SIGNED_BLOCKS_WINDOW: u64 = 100;

/// Default number of missed votes within the window that a provider may accumulate before it is
/// jailed.
pub(crate) const MAX_MISSED_BLOCKS: u64 = 50;

/// Default cooldown, in seconds, before a jailed provider may unjail.
pub(crate) const JAIL_DURATION_SECS: u64 = 24 * 60 * 60;

/// Default minimum number of public randomness values per commitment.
pub(crate) const MIN_PUB_RAND: u64 = 100;

/// Default number of blocks a provider has to vote before its vote counts as missed.
pub(crate) const FINALITY_SIG_TIMEOUT: u64 = 3;

/// Default number of host blocks per epoch.
pub(crate) const EPOCH_INTERVAL: u64 = 10;
