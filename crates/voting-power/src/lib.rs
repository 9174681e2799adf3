//! Voting power of finality providers.
//!
//! The power table maps each eligible provider to the value delegated to it by active
//! delegations. Tables are snapshotted by host height so that votes and finality at a height are
//! always judged against the power at that height.

pub mod snapshot;
pub mod table;

pub use snapshot::{power_table_at, record_snapshot, total_power_at, voting_power};
pub use table::PowerTable;
