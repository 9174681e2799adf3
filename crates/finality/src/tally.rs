//! Indexed host blocks and their finalization.

use std::collections::BTreeMap;

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_primitives::types::{AppHash, BlockHeight};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{errors::FinalityResult, vote::votes_at};

/// A host block as seen by finality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedBlock {
    /// Height of the block.
    pub height: BlockHeight,

    /// Hash of the block's application state.
    pub app_hash: AppHash,

    /// Whether the block has gathered a finality quorum.
    pub finalized: bool,
}

/// Records the block at `height` as not yet finalized.
pub fn index_block<S: KvStore + ?Sized>(
    store: &mut S,
    height: BlockHeight,
    app_hash: AppHash,
) -> FinalityResult<IndexedBlock> {
    let block = IndexedBlock {
        height,
        app_hash,
        finalized: false,
    };
    store.put_typed(indexed_block_key(height).as_bytes(), &block)?;

    if next_height_to_finalize(store)?.is_none() {
        set_next_height_to_finalize(store, height)?;
    }

    Ok(block)
}

/// Returns the indexed block at `height`.
pub fn indexed_block<S: KvStore + ?Sized>(
    store: &S,
    height: BlockHeight,
) -> FinalityResult<Option<IndexedBlock>> {
    Ok(store.get_typed(indexed_block_key(height).as_bytes())?)
}

/// Returns the lowest height that may still be finalized, once any block was indexed.
pub fn next_height_to_finalize<S: KvStore + ?Sized>(store: &S) -> FinalityResult<Option<BlockHeight>> {
    Ok(store.get_typed(Key::new(prefix::NEXT_HEIGHT_TO_FINALIZE).as_bytes())?)
}

fn set_next_height_to_finalize<S: KvStore + ?Sized>(store: &mut S, height: BlockHeight) -> FinalityResult<()> {
    store.put_typed(Key::new(prefix::NEXT_HEIGHT_TO_FINALIZE).as_bytes(), &height)?;

    Ok(())
}

/// Returns `true` if the power behind `app_hash` is strictly more than two thirds of the total.
pub fn has_quorum(
    power_table: &BTreeMap<XOnlyPublicKey, u64>,
    votes: &BTreeMap<XOnlyPublicKey, AppHash>,
    app_hash: &AppHash,
) -> bool {
    let total: u128 = power_table.values().map(|power| *power as u128).sum();
    let voted: u128 = power_table
        .iter()
        .filter(|(fp_pk, _)| votes.get(fp_pk) == Some(app_hash))
        .map(|(_, power)| *power as u128)
        .sum();

    total > 0 && voted * 3 > total * 2
}

/// Finalizes indexed blocks in height order, up to and including `up_to`.
///
/// `power_at` yields the power table of a height. Heights without any power cannot gather a
/// quorum and are passed over; the first height with power that lacks a quorum stops the walk.
/// Returns the newly finalized blocks.
pub fn tally_blocks<S, F>(store: &mut S, up_to: BlockHeight, mut power_at: F) -> FinalityResult<Vec<IndexedBlock>>
where
    S: KvStore + ?Sized,
    F: FnMut(&S, BlockHeight) -> FinalityResult<BTreeMap<XOnlyPublicKey, u64>>,
{
    let Some(start) = next_height_to_finalize(store)? else {
        return Ok(Vec::new());
    };

    let mut finalized = Vec::new();
    let mut next = start;
    for height in start..=up_to {
        let Some(mut block) = indexed_block(store, height)? else {
            break;
        };

        let power_table = power_at(&*store, height)?;
        if power_table.is_empty() {
            debug!(%height, "no voting power, skipping block");
            next = height + 1;
            continue;
        }

        let votes = votes_at(store, height)?
            .into_iter()
            .map(|(fp_pk, vote)| (fp_pk, vote.app_hash))
            .collect();
        if !has_quorum(&power_table, &votes, &block.app_hash) {
            break;
        }

        block.finalized = true;
        store.put_typed(indexed_block_key(height).as_bytes(), &block)?;
        info!(%height, app_hash = %block.app_hash, "finalized block");

        finalized.push(block);
        next = height + 1;
    }

    if next != start {
        set_next_height_to_finalize(store, next)?;
    }

    Ok(finalized)
}

fn indexed_block_key(height: BlockHeight) -> Key {
    Key::new(prefix::INDEXED_BLOCK).push_u64(height)
}

#[cfg(test)]
mod tests {
    use btc_staking_db::InMemoryStore;
    use btc_staking_test_utils::prelude::*;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_quorum_is_strictly_above_two_thirds() {
        let (pks, _) = generate_xonly_keys(3);
        let table = pks.iter().map(|pk| (*pk, 10)).collect::<BTreeMap<_, _>>();
        let block = AppHash::new([1; 32]);
        let fork = AppHash::new([2; 32]);

        let two = BTreeMap::from([(pks[0], block), (pks[1], block), (pks[2], fork)]);
        assert!(!has_quorum(&table, &two, &block), "exactly 2/3 is not enough");

        let three = pks.iter().map(|pk| (*pk, block)).collect();
        assert!(has_quorum(&table, &three, &block));
        assert!(!has_quorum(&BTreeMap::new(), &three, &block));

        // votes from providers without power do not count
        let outsider = BTreeMap::from([(generate_xonly_pubkey(), block)]);
        assert!(!has_quorum(&table, &outsider, &block));
    }

    #[test]
    fn test_tally_stops_at_first_unfinalizable_block() {
        let mut store = InMemoryStore::new();
        for height in 5..=8 {
            index_block(&mut store, height, AppHash::new([height as u8; 32])).unwrap();
        }
        assert_eq!(next_height_to_finalize(&store).unwrap(), Some(5));

        // no votes at all: nothing with power can finalize
        let fp_pk = generate_xonly_pubkey();
        let finalized = tally_blocks(&mut store, 8, |_, height| {
            Ok(if height < 6 {
                BTreeMap::new()
            } else {
                BTreeMap::from([(fp_pk, 1)])
            })
        })
        .unwrap();
        assert!(finalized.is_empty());
        assert_eq!(next_height_to_finalize(&store).unwrap(), Some(6));
        assert!(!indexed_block(&store, 5).unwrap().unwrap().finalized);
    }

    proptest! {
        #[test]
        fn quorum_matches_integer_threshold(powers in prop::collection::vec(0u64..1_000, 1..8), mask: u8) {
            let (pks, _) = generate_xonly_keys(powers.len());
            let table = pks.iter().copied().zip(powers.iter().copied()).collect::<BTreeMap<_, _>>();
            let block = AppHash::new([7; 32]);
            let votes = pks
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, pk)| (*pk, block))
                .collect::<BTreeMap<_, _>>();

            let total: u64 = powers.iter().sum();
            let voted: u64 = powers.iter().enumerate().filter(|(i, _)| mask & (1 << i) != 0).map(|(_, p)| p).sum();

            prop_assert_eq!(has_quorum(&table, &votes, &block), total > 0 && 3 * voted > 2 * total);
        }
    }
}
