//! Storage of providers and delegations.

use bitcoin::{hashes::Hash, BlockHash, Txid};
use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use secp256k1::XOnlyPublicKey;

use crate::{
    errors::StakingResult,
    types::{BtcDelegation, DelegationState, FinalityProvider},
};

/// States that are indexed; terminal delegations drop out of the index.
const LIVE_STATES: [DelegationState; 3] = [
    DelegationState::Pending,
    DelegationState::Active,
    DelegationState::Unbonded,
];

/// Returns the provider registered under `fp_pk`.
pub(crate) fn provider<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> StakingResult<Option<FinalityProvider>> {
    Ok(store.get_typed(provider_key(fp_pk).as_bytes())?)
}

pub(crate) fn put_provider<S: KvStore + ?Sized>(
    store: &mut S,
    provider: &FinalityProvider,
) -> StakingResult<()> {
    store.put_typed(provider_key(&provider.btc_pk).as_bytes(), provider)?;

    Ok(())
}

/// Returns every provider in key order.
pub(crate) fn providers<S: KvStore + ?Sized>(store: &S) -> StakingResult<Vec<FinalityProvider>> {
    Ok(store
        .iterate_typed::<FinalityProvider>(Key::new(prefix::FINALITY_PROVIDER).as_bytes())?
        .into_iter()
        .map(|(_, provider)| provider)
        .collect())
}

/// Returns the delegation whose staking tx is `staking_txid`.
pub(crate) fn delegation<S: KvStore + ?Sized>(
    store: &S,
    staking_txid: &Txid,
) -> StakingResult<Option<BtcDelegation>> {
    Ok(store.get_typed(delegation_key(staking_txid).as_bytes())?)
}

/// Stores `delegation` along with its provider, inclusion block and state indices.
pub(crate) fn put_delegation<S: KvStore + ?Sized>(
    store: &mut S,
    delegation: &BtcDelegation,
) -> StakingResult<()> {
    let staking_txid = delegation.staking_txid();
    store.put_typed(delegation_key(&staking_txid).as_bytes(), delegation)?;

    for state in LIVE_STATES {
        let key = state_key(state, &staking_txid);
        if state == delegation.state {
            store.put_typed(key.as_bytes(), &())?;
        } else {
            store.delete(key.as_bytes())?;
        }
    }

    for fp_pk in &delegation.fp_pks {
        let key = Key::new(prefix::FP_DELEGATIONS)
            .push(fp_pk.serialize())
            .push(staking_txid.as_byte_array());
        store.put_typed(key.as_bytes(), &())?;
    }

    let key = Key::new(prefix::DELEGATIONS_BY_BLOCK)
        .push(delegation.inclusion_block.as_byte_array())
        .push(staking_txid.as_byte_array());
    store.put_typed(key.as_bytes(), &())?;

    Ok(())
}

/// Drops `delegation` from the index of its current inclusion block.
pub(crate) fn unindex_inclusion_block<S: KvStore + ?Sized>(
    store: &mut S,
    delegation: &BtcDelegation,
) -> StakingResult<()> {
    let key = Key::new(prefix::DELEGATIONS_BY_BLOCK)
        .push(delegation.inclusion_block.as_byte_array())
        .push(delegation.staking_txid().as_byte_array());
    store.delete(key.as_bytes())?;

    Ok(())
}

/// Returns the delegations currently in `state`, in staking txid order.
///
/// Only non-terminal states are indexed, so asking for a terminal one yields nothing.
pub(crate) fn delegations_in<S: KvStore + ?Sized>(
    store: &S,
    state: DelegationState,
) -> StakingResult<Vec<BtcDelegation>> {
    let index = Key::new(prefix::DELEGATIONS_BY_STATE).push([state_tag(state)]);

    let mut delegations = Vec::new();
    for staking_txid in txids_under(store, index)? {
        if let Some(delegation) = delegation(store, &staking_txid)? {
            delegations.push(delegation);
        }
    }

    Ok(delegations)
}

/// Returns the ids of the delegations to `fp_pk`, in ascending order.
pub(crate) fn delegation_ids_by_provider<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> StakingResult<Vec<Txid>> {
    txids_under(store, Key::new(prefix::FP_DELEGATIONS).push(fp_pk.serialize()))
}

/// Returns the ids of the delegations whose staking tx is in `block_hash`, in ascending order.
pub(crate) fn delegation_ids_by_block<S: KvStore + ?Sized>(
    store: &S,
    block_hash: &BlockHash,
) -> StakingResult<Vec<Txid>> {
    txids_under(
        store,
        Key::new(prefix::DELEGATIONS_BY_BLOCK).push(block_hash.as_byte_array()),
    )
}

fn txids_under<S: KvStore + ?Sized>(store: &S, index: Key) -> StakingResult<Vec<Txid>> {
    let offset = index.as_bytes().len();

    Ok(store
        .iterate(index.as_bytes())?
        .into_iter()
        .filter_map(|(key, _)| Txid::from_slice(key.get(offset..)?).ok())
        .collect())
}

fn provider_key(fp_pk: &XOnlyPublicKey) -> Key {
    Key::new(prefix::FINALITY_PROVIDER).push(fp_pk.serialize())
}

fn delegation_key(staking_txid: &Txid) -> Key {
    Key::new(prefix::BTC_DELEGATION).push(staking_txid.as_byte_array())
}

fn state_key(state: DelegationState, staking_txid: &Txid) -> Key {
    Key::new(prefix::DELEGATIONS_BY_STATE)
        .push([state_tag(state)])
        .push(staking_txid.as_byte_array())
}

const fn state_tag(state: DelegationState) -> u8 {
    match state {
        DelegationState::Pending => 0,
        DelegationState::Active => 1,
        DelegationState::Unbonded => 2,
        DelegationState::Slashed => 3,
        DelegationState::Expired => 4,
    }
}
