//! The BTC staking and finality core.
//!
//! Bitcoin holders lock BTC in self-custodial staking outputs and delegate the resulting voting
//! power to finality providers, which vote on host-chain blocks with extractable one-time
//! signatures. A provider that votes twice at one height reveals its key, which completes the
//! pre-signed slashing txs of every delegation to it.
//!
//! [`StakingContext`] is the entry point. The host opens a block, delivers the block's
//! [`Msg`]s and closes the block; each step is deterministic given the store and the
//! [`btc_staking_params::Params`].

mod context;
pub mod errors;
pub mod events;
mod handlers;
mod hooks;
pub mod msgs;
mod power;
mod queries;
mod slashing;
mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use context::StakingContext;
pub use errors::{StakingError, StakingResult};
pub use events::{EventListener, StakingEvent};
pub use msgs::Msg;
pub use types::{BtcDelegation, DelegationState, FinalityProvider};
