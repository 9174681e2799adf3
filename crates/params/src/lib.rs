//! This crate contains the consensus-critical parameters of the BTC staking protocol. Every node
//! must run with identical parameters to agree on delegation, voting-power and finality state.

mod default;
pub mod epoching;
pub mod errors;
pub mod finality;
pub mod staking;
pub mod types;

use serde::{Deserialize, Serialize};

pub use crate::{
    epoching::EpochingParams, errors::ParamsError, finality::FinalityParams,
    staking::StakingParams, types::SlashingRate,
};
use crate::errors::ParamsResult;

/// All parameters of the staking core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// BTC staking parameters.
    pub staking: StakingParams,

    /// Finality and liveness parameters.
    pub finality: FinalityParams,

    /// Epoching parameters.
    pub epoching: EpochingParams,
}

impl Params {
    /// Validates every parameter group.
    pub fn validate(&self) -> ParamsResult<()> {
        self.staking.validate()?;
        self.finality.validate()?;
        self.epoching.validate()
    }
}
