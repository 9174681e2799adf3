//! Parameters for epoch bookkeeping.

use serde::{Deserialize, Serialize};

use super::default::EPOCH_INTERVAL;
use crate::errors::{ParamsError, ParamsResult};

/// Epoching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochingParams {
    /// Number of host blocks per epoch.
    ///
    /// A change only takes effect at the start of the next epoch.
    pub epoch_interval: u64,
}

impl EpochingParams {
    /// Validates the parameters.
    pub fn validate(&self) -> ParamsResult<()> {
        if self.epoch_interval == 0 {
            return Err(ParamsError::Zero("epoch_interval"));
        }

        Ok(())
    }
}

impl Default for EpochingParams {
    fn default() -> Self {
        Self {
            epoch_interval: EPOCH_INTERVAL,
        }
    }
}
