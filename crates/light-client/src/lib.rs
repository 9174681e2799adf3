//! Bitcoin header chain tracking with fork choice by cumulative work.
//!
//! The light client validates headers against the network's proof-of-work limit, maintains the
//! canonical chain in a [`btc_staking_db::KvStore`] and reports reorgs as ordered
//! [`ChainEvent`]s. It also verifies that transactions are included in canonical blocks.

pub mod chain;
pub mod errors;
pub mod events;
pub mod header;
pub mod inclusion;
pub mod shared;

pub use chain::BtcLightClient;
pub use errors::{HeaderError, HeaderResult};
pub use events::ChainEvent;
pub use header::BtcHeaderInfo;
pub use inclusion::TxInclusionProof;
pub use shared::SharedLightClient;
