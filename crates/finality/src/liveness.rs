//! Liveness tracking of finality providers.
//!
//! Every provider with voting power has a sliding window of the last `signed_blocks_window`
//! heights it was expected to vote on. Missing more than `max_missed_blocks` of them gets it
//! jailed.

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_params::FinalityParams;
use btc_staking_primitives::types::{BlockHeight, BlockTime};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{FinalityError, FinalityResult};

/// Liveness record of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    /// The provider.
    pub fp_pk: XOnlyPublicKey,

    /// Height from which the provider has been expected to vote.
    pub start_height: BlockHeight,

    /// Number of heights checked so far; its remainder by the window size is the next slot.
    pub index_offset: u64,

    /// Number of set bits in the missed-block window.
    pub missed_blocks_counter: u64,

    /// Block time until which the provider stays jailed, if it is jailed.
    pub jailed_until: Option<BlockTime>,
}

impl SigningInfo {
    /// Creates a fresh record.
    pub const fn new(fp_pk: XOnlyPublicKey, start_height: BlockHeight) -> Self {
        Self {
            fp_pk,
            start_height,
            index_offset: 0,
            missed_blocks_counter: 0,
            jailed_until: None,
        }
    }

    /// Returns `true` if the provider is jailed.
    pub const fn is_jailed(&self) -> bool {
        self.jailed_until.is_some()
    }
}

/// Returns the provider's signing info.
pub fn signing_info<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> FinalityResult<Option<SigningInfo>> {
    Ok(store.get_typed(signing_info_key(fp_pk).as_bytes())?)
}

/// Starts tracking the provider from `start_height` unless it is already tracked.
pub fn init_signing_info<S: KvStore + ?Sized>(
    store: &mut S,
    fp_pk: &XOnlyPublicKey,
    start_height: BlockHeight,
) -> FinalityResult<SigningInfo> {
    if let Some(info) = signing_info(store, fp_pk)? {
        return Ok(info);
    }

    let info = SigningInfo::new(*fp_pk, start_height);
    put_signing_info(store, &info)?;

    Ok(info)
}

/// Records whether the provider voted at `height` and returns `true` if it must be jailed.
///
/// Jailed providers are not tracked; the call is a no-op for them.
pub fn handle_liveness<S: KvStore + ?Sized>(
    store: &mut S,
    params: &FinalityParams,
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
    voted: bool,
) -> FinalityResult<bool> {
    let mut info = init_signing_info(store, fp_pk, height)?;
    if info.is_jailed() {
        return Ok(false);
    }

    let window = params.signed_blocks_window;
    let index = info.index_offset % window;
    info.index_offset += 1;

    let missed = !voted;
    let previously_missed = missed_bit(store, fp_pk, index)?;
    match (missed, previously_missed) {
        (true, false) => {
            set_missed_bit(store, fp_pk, index, true)?;
            info.missed_blocks_counter += 1;
        }
        (false, true) => {
            set_missed_bit(store, fp_pk, index, false)?;
            info.missed_blocks_counter -= 1;
        }
        _ => {}
    }

    if missed {
        debug!(%fp_pk, %height, missed = info.missed_blocks_counter, "provider missed a vote");
    }

    put_signing_info(store, &info)?;

    let min_height = info.start_height + window;

    Ok(height >= min_height && info.missed_blocks_counter > params.max_missed_blocks)
}

/// Jails the provider until `block_time + jail_duration_secs` and clears its window.
pub fn jail<S: KvStore + ?Sized>(
    store: &mut S,
    params: &FinalityParams,
    fp_pk: &XOnlyPublicKey,
    block_time: BlockTime,
) -> FinalityResult<BlockTime> {
    let mut info = signing_info(store, fp_pk)?.ok_or(FinalityError::UnknownProvider(*fp_pk))?;

    let jailed_until = block_time.saturating_add(params.jail_duration_secs);
    info.jailed_until = Some(jailed_until);
    info.missed_blocks_counter = 0;
    info.index_offset = 0;
    clear_missed_bits(store, fp_pk)?;
    put_signing_info(store, &info)?;

    info!(%fp_pk, %jailed_until, "jailed finality provider");

    Ok(jailed_until)
}

/// Releases the provider from jail and restarts its window at `height`.
pub fn unjail<S: KvStore + ?Sized>(
    store: &mut S,
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
    block_time: BlockTime,
) -> FinalityResult<()> {
    let info = signing_info(store, fp_pk)?.ok_or(FinalityError::UnknownProvider(*fp_pk))?;

    let jailed_until = info.jailed_until.ok_or(FinalityError::NotJailed(*fp_pk))?;
    if block_time < jailed_until {
        return Err(FinalityError::StillJailed {
            fp_pk: *fp_pk,
            jailed_until,
        });
    }

    put_signing_info(store, &SigningInfo::new(*fp_pk, height))?;

    info!(%fp_pk, %height, "unjailed finality provider");

    Ok(())
}

fn put_signing_info<S: KvStore + ?Sized>(store: &mut S, info: &SigningInfo) -> FinalityResult<()> {
    store.put_typed(signing_info_key(&info.fp_pk).as_bytes(), info)?;

    Ok(())
}

fn signing_info_key(fp_pk: &XOnlyPublicKey) -> Key {
    Key::new(prefix::SIGNING_INFO).push(fp_pk.serialize())
}

fn missed_bit_key(fp_pk: &XOnlyPublicKey, index: u64) -> Key {
    Key::new(prefix::MISSED_BLOCK).push(fp_pk.serialize()).push_u64(index)
}

fn missed_bit<S: KvStore + ?Sized>(store: &S, fp_pk: &XOnlyPublicKey, index: u64) -> FinalityResult<bool> {
    Ok(store.get(missed_bit_key(fp_pk, index).as_bytes())?.is_some())
}

// only set bits are stored
fn set_missed_bit<S: KvStore + ?Sized>(
    store: &mut S,
    fp_pk: &XOnlyPublicKey,
    index: u64,
    missed: bool,
) -> FinalityResult<()> {
    let key = missed_bit_key(fp_pk, index);
    if missed {
        store.set(key.as_bytes(), vec![1])?;
    } else {
        store.delete(key.as_bytes())?;
    }

    Ok(())
}

fn clear_missed_bits<S: KvStore + ?Sized>(store: &mut S, fp_pk: &XOnlyPublicKey) -> FinalityResult<()> {
    let prefix = Key::new(prefix::MISSED_BLOCK).push(fp_pk.serialize());
    for (key, _) in store.iterate(prefix.as_bytes())? {
        store.delete(&key)?;
    }

    Ok(())
}
