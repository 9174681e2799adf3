//! Re-exports of the connectors.

pub use super::{
    change::SlashingChangeConnector, staking::StakingConnector, unbonding::UnbondingConnector,
    Connector, SlashableConnector,
};
