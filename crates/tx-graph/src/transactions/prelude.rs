//! Re-exports of the transactions.

pub use super::{
    slashing::SlashingTx,
    staking::{create_staking_tx, verify_staking_tx},
    unbonding::UnbondingTx,
    verify_schnorr_sig,
};
