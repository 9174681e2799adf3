//! Power table snapshots keyed by host height.
//!
//! A snapshot is only written when the table may have changed; the table at any height is the
//! latest snapshot at or below it.

use btc_staking_db::{
    keys::{prefix, read_u64},
    DbResult, Key, KvStore, TypedKvExt,
};
use btc_staking_primitives::types::BlockHeight;
use secp256k1::XOnlyPublicKey;
use tracing::debug;

use crate::table::PowerTable;

/// Stores `table` as the power table from `height` on, replacing any snapshot at `height`.
pub fn record_snapshot<S: KvStore + ?Sized>(
    store: &mut S,
    height: BlockHeight,
    table: &PowerTable,
) -> DbResult<()> {
    let entries = Key::new(prefix::VOTING_POWER).push_u64(height);
    for (key, _) in store.iterate(entries.as_bytes())? {
        store.delete(&key)?;
    }

    for (fp_pk, power) in table.iter() {
        store.put_typed(entries.clone().push(fp_pk.serialize()).as_bytes(), power)?;
    }

    store.put_typed(
        Key::new(prefix::VOTING_POWER_SNAPSHOT).push_u64(height).as_bytes(),
        &table.total(),
    )?;

    debug!(%height, providers = table.len(), total = table.total(), "recorded power table");

    Ok(())
}

/// Returns the height of the snapshot in force at `height`.
pub fn snapshot_height<S: KvStore + ?Sized>(store: &S, height: BlockHeight) -> DbResult<Option<BlockHeight>> {
    let prefix_len = Key::new(prefix::VOTING_POWER_SNAPSHOT).as_bytes().len();

    Ok(store
        .iterate(Key::new(prefix::VOTING_POWER_SNAPSHOT).as_bytes())?
        .into_iter()
        .filter_map(|(key, _)| read_u64(&key, prefix_len))
        .take_while(|snapshot| *snapshot <= height)
        .last())
}

/// Returns the power table at `height`.
pub fn power_table_at<S: KvStore + ?Sized>(store: &S, height: BlockHeight) -> DbResult<PowerTable> {
    let Some(snapshot) = snapshot_height(store, height)? else {
        return Ok(PowerTable::default());
    };

    let entries = Key::new(prefix::VOTING_POWER).push_u64(snapshot);
    let offset = entries.as_bytes().len();

    Ok(store
        .iterate_typed::<u64>(entries.as_bytes())?
        .into_iter()
        .filter_map(|(key, power)| Some((XOnlyPublicKey::from_slice(key.get(offset..)?).ok()?, power)))
        .collect())
}

/// Returns the power of `fp_pk` at `height`.
pub fn voting_power<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
) -> DbResult<u64> {
    let Some(snapshot) = snapshot_height(store, height)? else {
        return Ok(0);
    };

    let key = Key::new(prefix::VOTING_POWER)
        .push_u64(snapshot)
        .push(fp_pk.serialize());

    Ok(store.get_typed(key.as_bytes())?.unwrap_or_default())
}

/// Returns the total power at `height`.
pub fn total_power_at<S: KvStore + ?Sized>(store: &S, height: BlockHeight) -> DbResult<u64> {
    let Some(snapshot) = snapshot_height(store, height)? else {
        return Ok(0);
    };

    Ok(store
        .get_typed(Key::new(prefix::VOTING_POWER_SNAPSHOT).push_u64(snapshot).as_bytes())?
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use btc_staking_db::InMemoryStore;
    use btc_staking_test_utils::prelude::*;

    use super::*;

    #[test]
    fn test_latest_snapshot_applies() {
        let mut store = InMemoryStore::new();
        let (pks, _) = generate_xonly_keys(2);

        assert!(power_table_at(&store, 100).unwrap().is_empty());

        let first = PowerTable::from_iter([(pks[0], 10), (pks[1], 20)]);
        record_snapshot(&mut store, 5, &first).unwrap();
        let second = PowerTable::from_iter([(pks[1], 20)]);
        record_snapshot(&mut store, 9, &second).unwrap();

        assert!(power_table_at(&store, 4).unwrap().is_empty());
        assert_eq!(power_table_at(&store, 5).unwrap(), first);
        assert_eq!(power_table_at(&store, 8).unwrap(), first);
        assert_eq!(power_table_at(&store, 9).unwrap(), second);
        assert_eq!(power_table_at(&store, 1_000).unwrap(), second);

        assert_eq!(voting_power(&store, &pks[0], 8).unwrap(), 10);
        assert_eq!(voting_power(&store, &pks[0], 9).unwrap(), 0);
        assert_eq!(total_power_at(&store, 7).unwrap(), 30);
        assert_eq!(total_power_at(&store, 3).unwrap(), 0);
    }

    #[test]
    fn test_rewriting_a_height_drops_stale_entries() {
        let mut store = InMemoryStore::new();
        let (pks, _) = generate_xonly_keys(2);

        record_snapshot(&mut store, 3, &PowerTable::from_iter([(pks[0], 10), (pks[1], 5)])).unwrap();
        record_snapshot(&mut store, 3, &PowerTable::from_iter([(pks[1], 5)])).unwrap();

        assert_eq!(power_table_at(&store, 3).unwrap(), PowerTable::from_iter([(pks[1], 5)]));
        assert_eq!(total_power_at(&store, 3).unwrap(), 5);
    }
}
