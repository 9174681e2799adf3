//! Epochs and their storage.

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_params::EpochingParams;
use btc_staking_primitives::types::BlockHeight;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{EpochingError, EpochingResult};

/// Number of an epoch.
pub type EpochNumber = u64;

/// A contiguous range of host blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Sequence number; genesis is epoch 0.
    pub epoch_number: EpochNumber,

    /// Height of the first block in the epoch.
    pub first_block_height: BlockHeight,

    /// Number of blocks in the epoch, fixed when the epoch starts.
    pub interval: u64,
}

impl Epoch {
    /// The genesis epoch, which consists of height 0 only.
    pub const fn genesis() -> Self {
        Self {
            epoch_number: 0,
            first_block_height: 0,
            interval: 1,
        }
    }

    /// Returns the height of the last block in the epoch.
    pub const fn last_block_height(&self) -> BlockHeight {
        self.first_block_height + self.interval - 1
    }

    /// Returns `true` if `height` belongs to the epoch.
    pub const fn contains(&self, height: BlockHeight) -> bool {
        self.first_block_height <= height && height <= self.last_block_height()
    }

    /// Returns the epoch that follows this one, lasting `interval` blocks.
    pub const fn next(&self, interval: u64) -> Self {
        Self {
            epoch_number: self.epoch_number + 1,
            first_block_height: self.last_block_height() + 1,
            interval,
        }
    }
}

/// Stores the genesis epoch and the initial parameters.
pub fn init_genesis<S: KvStore + ?Sized>(store: &mut S, params: &EpochingParams) -> EpochingResult<Epoch> {
    match current_epoch(store) {
        Ok(_) => return Err(EpochingError::AlreadyInitialized),
        Err(EpochingError::NotInitialized) => {}
        Err(e) => return Err(e),
    }

    params.validate()?;
    put_params(store, params)?;

    let genesis = Epoch::genesis();
    put_epoch(store, &genesis)?;

    Ok(genesis)
}

/// Returns the current epoch.
pub fn current_epoch<S: KvStore + ?Sized>(store: &S) -> EpochingResult<Epoch> {
    store
        .iterate_typed::<Epoch>(Key::new(prefix::EPOCH).as_bytes())?
        .pop()
        .map(|(_, epoch)| epoch)
        .ok_or(EpochingError::NotInitialized)
}

/// Returns the epoch numbered `epoch_number`, if it has started.
pub fn epoch<S: KvStore + ?Sized>(store: &S, epoch_number: EpochNumber) -> EpochingResult<Option<Epoch>> {
    Ok(store.get_typed(epoch_key(epoch_number).as_bytes())?)
}

/// Returns the parameters that will apply to the next epoch.
pub fn params<S: KvStore + ?Sized>(store: &S) -> EpochingResult<EpochingParams> {
    store
        .get_typed(Key::new(prefix::EPOCHING_PARAMS).as_bytes())?
        .ok_or(EpochingError::NotInitialized)
}

/// Replaces the parameters.
///
/// The current epoch keeps its interval; the new one applies from the next epoch on.
pub fn set_params<S: KvStore + ?Sized>(store: &mut S, params: &EpochingParams) -> EpochingResult<()> {
    params.validate()?;
    current_epoch(store)?;

    put_params(store, params)?;

    Ok(())
}

/// Moves to the next epoch if `height` is the first height after the current one.
///
/// Returns the new epoch if one started.
pub fn on_block_start<S: KvStore + ?Sized>(store: &mut S, height: BlockHeight) -> EpochingResult<Option<Epoch>> {
    let current = current_epoch(store)?;
    let boundary = current.last_block_height() + 1;

    if height < boundary {
        return Ok(None);
    }

    if height > boundary {
        return Err(EpochingError::UnexpectedHeight {
            expected: boundary,
            actual: height,
        });
    }

    let next = current.next(params(store)?.epoch_interval);
    put_epoch(store, &next)?;

    info!(
        epoch = next.epoch_number,
        first = next.first_block_height,
        last = next.last_block_height(),
        "advanced epoch"
    );

    Ok(Some(next))
}

fn put_epoch<S: KvStore + ?Sized>(store: &mut S, epoch: &Epoch) -> EpochingResult<()> {
    store.put_typed(epoch_key(epoch.epoch_number).as_bytes(), epoch)?;

    Ok(())
}

fn put_params<S: KvStore + ?Sized>(store: &mut S, params: &EpochingParams) -> EpochingResult<()> {
    store.put_typed(Key::new(prefix::EPOCHING_PARAMS).as_bytes(), params)?;

    Ok(())
}

fn epoch_key(epoch_number: EpochNumber) -> Key {
    Key::new(prefix::EPOCH).push_u64(epoch_number)
}
