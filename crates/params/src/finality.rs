//! Parameters for finality voting and provider liveness.

use serde::{Deserialize, Serialize};

use super::default::{
    FINALITY_SIG_TIMEOUT, JAIL_DURATION_SECS, MAX_MISSED_BLOCKS, MIN_PUB_RAND,
    SIGNED_BLOCKS_WINDOW,
};
use crate::errors::{ParamsError, ParamsResult};

/// Finality and liveness parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityParams {
    /// Size of the sliding window over which missed votes are counted.
    pub signed_blocks_window: u64,

    /// A provider with more missed votes than this within the window is jailed.
    pub max_missed_blocks: u64,

    /// Seconds a jailed provider has to wait before it may unjail.
    pub jail_duration_secs: u64,

    /// Minimum number of public randomness values a single commitment must cover.
    pub min_pub_rand: u64,

    /// Number of blocks after a height before a missing vote at that height counts as missed.
    pub finality_sig_timeout: u64,
}

impl FinalityParams {
    /// Validates the parameters.
    pub fn validate(&self) -> ParamsResult<()> {
        if self.signed_blocks_window == 0 {
            return Err(ParamsError::Zero("signed_blocks_window"));
        }

        if self.max_missed_blocks >= self.signed_blocks_window {
            return Err(ParamsError::InvalidLivenessWindow {
                window: self.signed_blocks_window,
                max_missed: self.max_missed_blocks,
            });
        }

        if self.min_pub_rand == 0 {
            return Err(ParamsError::Zero("min_pub_rand"));
        }

        Ok(())
    }
}

impl Default for FinalityParams {
    fn default() -> Self {
        Self {
            signed_blocks_window: SIGNED_BLOCKS_WINDOW,
            max_missed_blocks: MAX_MISSED_BLOCKS,
            jail_duration_secs: JAIL_DURATION_SECS,
            min_pub_rand: MIN_PUB_RAND,
            finality_sig_timeout: FINALITY_SIG_TIMEOUT,
        }
    }
}
