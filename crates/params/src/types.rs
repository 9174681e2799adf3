//! Types for the staking parameters.

use std::fmt;

use bitcoin::Amount;
use serde::{Deserialize, Serialize};

use crate::errors::ParamsError;

/// Number of basis points that make up a whole.
pub const BASIS_POINTS: u16 = 10_000;

/// Fraction of a staked value that is redirected to the slashing address, in basis points.
///
/// The rate is strictly between zero and one so that a slashing transaction always has both a
/// slashing output and a change output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct SlashingRate(u16);

impl SlashingRate {
    /// Returns the rate in basis points.
    pub const fn basis_points(&self) -> u16 {
        self.0
    }

    /// Computes the slashed portion of `value`, rounding down.
    pub fn slashed_amount(&self, value: Amount) -> Amount {
        let slashed = (value.to_sat() as u128 * self.0 as u128) / BASIS_POINTS as u128;

        // `slashed <= value` so the cast never truncates.
        Amount::from_sat(slashed as u64)
    }
}

impl TryFrom<u16> for SlashingRate {
    type Error = ParamsError;

    fn try_from(bps: u16) -> Result<Self, Self::Error> {
        if bps == 0 || bps >= BASIS_POINTS {
            return Err(ParamsError::InvalidSlashingRate(bps));
        }

        Ok(Self(bps))
    }
}

impl From<SlashingRate> for u16 {
    fn from(rate: SlashingRate) -> Self {
        rate.0
    }
}

impl fmt::Display for SlashingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Commission a finality provider charges on rewards, in basis points within `[0, 10000]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct CommissionRate(u16);

impl CommissionRate {
    /// Returns the rate in basis points.
    pub const fn basis_points(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for CommissionRate {
    type Error = ParamsError;

    fn try_from(bps: u16) -> Result<Self, Self::Error> {
        if bps > BASIS_POINTS {
            return Err(ParamsError::InvalidCommissionRate(bps));
        }

        Ok(Self(bps))
    }
}

impl From<CommissionRate> for u16 {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}
