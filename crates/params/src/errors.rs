//! Errors for the staking parameters.

use bitcoin::XOnlyPublicKey;
use thiserror::Error;

/// Error while creating or validating staking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// The slashing rate must lie strictly between 0 and 10000 basis points.
    #[error("slashing rate must be in (0, 10000) basis points, got {0}")]
    InvalidSlashingRate(u16),

    /// The commission rate must lie within `[0, 10000]` basis points.
    #[error("commission rate must be in [0, 10000] basis points, got {0}")]
    InvalidCommissionRate(u16),

    /// The covenant committee has no members.
    #[error("covenant committee must not be empty")]
    EmptyCovenantCommittee,

    /// The same key appears more than once in the covenant committee.
    #[error("duplicate covenant key {0}")]
    DuplicateCovenantKey(XOnlyPublicKey),

    /// The quorum is zero or larger than the committee.
    #[error("covenant quorum {quorum} is invalid for a committee of {size}")]
    InvalidQuorum {
        /// The configured quorum.
        quorum: u32,
        /// The size of the committee.
        size: usize,
    },

    /// The staking time bounds are inverted or zero.
    #[error("invalid staking time range [{min}, {max}]")]
    InvalidStakingTimeRange {
        /// Lower bound.
        min: u16,
        /// Upper bound.
        max: u16,
    },

    /// The staking value bounds are inverted or zero.
    #[error("invalid staking value range [{min}, {max}]")]
    InvalidStakingValueRange {
        /// Lower bound in sats.
        min: u64,
        /// Upper bound in sats.
        max: u64,
    },

    /// The unbonding time must be non-zero and shorter than the minimum staking time.
    #[error("unbonding time {unbonding_time} must be in (0, {min_staking_time})")]
    InvalidUnbondingTime {
        /// The configured unbonding time.
        unbonding_time: u16,
        /// The configured minimum staking time.
        min_staking_time: u16,
    },

    /// The fees leave nothing for the staker at the minimum staking value.
    #[error("fees exceed the minimum staking value")]
    FeesExceedStake,

    /// A value that must be strictly positive is zero.
    #[error("{0} must be non-zero")]
    Zero(&'static str),

    /// The liveness threshold does not fit in the liveness window.
    #[error("max missed blocks {max_missed} must be smaller than the window {window}")]
    InvalidLivenessWindow {
        /// The size of the window.
        window: u64,
        /// The configured threshold.
        max_missed: u64,
    },
}

/// Result type for parameter validation.
pub type ParamsResult<T> = Result<T, ParamsError>;
