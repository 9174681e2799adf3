//! Header chain with fork choice by cumulative work.

use bitcoin::{block::Header, hashes::Hash, params::Params, BlockHash, Network, Target};
use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_primitives::types::BitcoinBlockHeight;
use tracing::{debug, error, info, trace, warn};

use crate::{
    errors::{HeaderError, HeaderResult},
    events::ChainEvent,
    header::BtcHeaderInfo,
};

/// Sign bit of the compact target encoding; targets are never negative.
const COMPACT_SIGN_BIT: u32 = 0x0080_0000;

/// The bitcoin light client.
///
/// Holds no state of its own: headers, the canonical index and the tip all live in the store
/// passed to each call, so the client can run inside the host's per-block write set.
#[derive(Debug, Clone)]
pub struct BtcLightClient {
    /// Easiest target allowed on the network.
    pow_limit: Target,
}

impl BtcLightClient {
    /// Creates a client that validates headers against the rules of `network`.
    pub fn new(network: Network) -> Self {
        Self {
            pow_limit: Params::new(network).max_attainable_target,
        }
    }

    /// Stores `header` at `height` as the base of the chain.
    ///
    /// The base is trusted: its proof of work is not checked and its parent need not be known.
    pub fn init_base<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        header: Header,
        height: BitcoinBlockHeight,
    ) -> HeaderResult<BtcHeaderInfo> {
        if store.get(Key::new(prefix::BTC_TIP).as_bytes())?.is_some() {
            return Err(HeaderError::AlreadyInitialized);
        }

        let info = BtcHeaderInfo::new(header, height, header.work());
        self.put_header(store, &info)?;
        self.set_canonical(store, &info)?;
        self.set_tip(store, &info)?;

        info!(hash = %info.hash(), %height, "initialized header chain");

        Ok(info)
    }

    /// Validates and inserts `header`, switching the canonical chain if it is now the heaviest.
    ///
    /// Returns the canonical-chain changes in the order they must be applied.
    pub fn insert_header<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        header: Header,
    ) -> HeaderResult<Vec<ChainEvent>> {
        let hash = header.block_hash();

        if self.header_by_hash(store, &hash)?.is_some() {
            return Err(HeaderError::Duplicate(hash));
        }

        let parent = self
            .header_by_hash(store, &header.prev_blockhash)?
            .ok_or(HeaderError::UnknownParent(header.prev_blockhash))?;

        self.check_pow(&header)?;

        let info = BtcHeaderInfo::new(
            header,
            parent.height() + 1,
            parent.cumulative_work() + header.work(),
        );
        self.put_header(store, &info)?;

        let tip = self.tip(store)?;
        if info.cumulative_work() <= tip.cumulative_work() {
            debug!(%hash, height = info.height(), tip = %tip.hash(), "accepted header on a lighter fork");
            return Ok(Vec::new());
        }

        self.switch_to(store, tip, info)
    }

    /// Moves the canonical chain from `old_tip` to `new_tip`.
    fn switch_to<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        old_tip: BtcHeaderInfo,
        new_tip: BtcHeaderInfo,
    ) -> HeaderResult<Vec<ChainEvent>> {
        // Walk back from the new tip until we hit a header on the current canonical chain.
        let mut new_branch = vec![new_tip.clone()];
        let mut cursor = self
            .header_by_hash(store, &new_tip.parent_hash())?
            .ok_or(HeaderError::MissingHeader(new_tip.parent_hash()))?;
        while !self.is_canonical(store, &cursor)? {
            let parent_hash = cursor.parent_hash();
            new_branch.push(cursor);
            cursor = self
                .header_by_hash(store, &parent_hash)?
                .ok_or(HeaderError::MissingHeader(parent_hash))?;
        }
        let fork_point = cursor;
        new_branch.reverse();

        let mut events = Vec::with_capacity(new_branch.len());

        let rollback_heights = (fork_point.height() + 1)..=old_tip.height();
        if !rollback_heights.is_empty() {
            info!(
                fork_height = fork_point.height(),
                old_tip = %old_tip.hash(),
                new_tip = %new_tip.hash(),
                "reorganizing canonical chain"
            );
        }
        for height in rollback_heights.rev() {
            let old = self.canonical_header_at(store, height)?;
            if height > new_tip.height() {
                store.delete(Key::new(prefix::BTC_HEIGHT_INDEX).push_u64(height).as_bytes())?;
            }
            trace!(hash = %old.hash(), %height, "rolling back");
            events.push(ChainEvent::RollBack(old));
        }

        for info in new_branch {
            self.set_canonical(store, &info)?;
            trace!(hash = %info.hash(), height = info.height(), "rolling forward");
            events.push(ChainEvent::RollForward(info));
        }

        self.set_tip(store, &new_tip)?;
        debug!(tip = %new_tip.hash(), height = new_tip.height(), "canonical tip updated");

        Ok(events)
    }

    fn check_pow(&self, header: &Header) -> HeaderResult<()> {
        let hash = header.block_hash();
        let bits = header.bits.to_consensus();
        let target = header.target();

        if bits & COMPACT_SIGN_BIT != 0 || target == Target::ZERO || target > self.pow_limit {
            warn!(%hash, %bits, "rejecting header with invalid target");
            return Err(HeaderError::InvalidTarget { hash, bits });
        }

        if header.validate_pow(target).is_err() {
            warn!(%hash, "rejecting header with insufficient work");
            return Err(HeaderError::InvalidProofOfWork(hash));
        }

        Ok(())
    }

    /// Returns the canonical tip.
    pub fn tip<S: KvStore + ?Sized>(&self, store: &S) -> HeaderResult<BtcHeaderInfo> {
        let tip_hash: BlockHash = store
            .get_typed(Key::new(prefix::BTC_TIP).as_bytes())?
            .ok_or(HeaderError::NotInitialized)?;

        self.header_by_hash(store, &tip_hash)?
            .ok_or(HeaderError::MissingHeader(tip_hash))
    }

    /// Returns the header with `hash`, canonical or not.
    pub fn header_by_hash<S: KvStore + ?Sized>(
        &self,
        store: &S,
        hash: &BlockHash,
    ) -> HeaderResult<Option<BtcHeaderInfo>> {
        Ok(store.get_typed(Key::new(prefix::BTC_HEADER).push(hash.as_byte_array()).as_bytes())?)
    }

    /// Returns the canonical header at `height`, if the canonical chain reaches it.
    pub fn header_at_height<S: KvStore + ?Sized>(
        &self,
        store: &S,
        height: BitcoinBlockHeight,
    ) -> HeaderResult<Option<BtcHeaderInfo>> {
        let hash: Option<BlockHash> =
            store.get_typed(Key::new(prefix::BTC_HEIGHT_INDEX).push_u64(height).as_bytes())?;

        match hash {
            Some(hash) => self
                .header_by_hash(store, &hash)?
                .map(Some)
                .ok_or(HeaderError::MissingCanonicalHeader(height)),
            None => Ok(None),
        }
    }

    /// Returns `true` if `info` is on the canonical chain.
    pub fn is_canonical<S: KvStore + ?Sized>(
        &self,
        store: &S,
        info: &BtcHeaderInfo,
    ) -> HeaderResult<bool> {
        let hash: Option<BlockHash> = store
            .get_typed(Key::new(prefix::BTC_HEIGHT_INDEX).push_u64(info.height()).as_bytes())?;

        Ok(hash == Some(info.hash()))
    }

    /// Returns the number of canonical blocks built on top of `hash`, or `None` if the header is
    /// unknown or not canonical.
    pub fn main_chain_depth<S: KvStore + ?Sized>(
        &self,
        store: &S,
        hash: &BlockHash,
    ) -> HeaderResult<Option<u64>> {
        let Some(info) = self.header_by_hash(store, hash)? else {
            return Ok(None);
        };

        if !self.is_canonical(store, &info)? {
            return Ok(None);
        }

        let tip = self.tip(store)?;

        Ok(Some(tip.height() - info.height()))
    }

    /// Returns `true` if `hash` is canonical with at least `min_depth` blocks on top of it.
    pub fn is_confirmed<S: KvStore + ?Sized>(
        &self,
        store: &S,
        hash: &BlockHash,
        min_depth: u64,
    ) -> HeaderResult<bool> {
        Ok(self
            .main_chain_depth(store, hash)?
            .is_some_and(|depth| depth >= min_depth))
    }

    fn canonical_header_at<S: KvStore + ?Sized>(
        &self,
        store: &S,
        height: BitcoinBlockHeight,
    ) -> HeaderResult<BtcHeaderInfo> {
        self.header_at_height(store, height)?.ok_or_else(|| {
            error!(%height, "canonical chain has a gap");
            HeaderError::MissingCanonicalHeader(height)
        })
    }

    fn put_header<S: KvStore + ?Sized>(&self, store: &mut S, info: &BtcHeaderInfo) -> HeaderResult<()> {
        store.put_typed(Key::new(prefix::BTC_HEADER).push(info.hash().as_byte_array()).as_bytes(), info)?;

        Ok(())
    }

    fn set_canonical<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        info: &BtcHeaderInfo,
    ) -> HeaderResult<()> {
        store.put_typed(
            Key::new(prefix::BTC_HEIGHT_INDEX).push_u64(info.height()).as_bytes(),
            &info.hash(),
        )?;

        Ok(())
    }

    fn set_tip<S: KvStore + ?Sized>(&self, store: &mut S, info: &BtcHeaderInfo) -> HeaderResult<()> {
        store.put_typed(Key::new(prefix::BTC_TIP).as_bytes(), &info.hash())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{CompactTarget, TxMerkleNode};
    use btc_staking_common::logging::{self, LoggerConfig};
    use btc_staking_db::InMemoryStore;
    use btc_staking_test_utils::prelude::*;

    use super::*;

    const BASE_HEIGHT: u64 = 100;

    fn setup() -> (BtcLightClient, InMemoryStore, BtcHeaderInfo) {
        logging::init(LoggerConfig::new("light-client-tests".to_string()));

        let client = BtcLightClient::new(Network::Regtest);
        let mut store = InMemoryStore::new();
        let base = client
            .init_base(&mut store, base_header(), BASE_HEIGHT)
            .expect("must init");

        (client, store, base)
    }

    fn insert_all(
        client: &BtcLightClient,
        store: &mut InMemoryStore,
        headers: &[Header],
    ) -> Vec<ChainEvent> {
        headers
            .iter()
            .flat_map(|header| client.insert_header(store, *header).expect("must insert"))
            .collect()
    }

    #[test]
    fn test_extend_tip_rolls_forward() {
        let (client, mut store, base) = setup();
        let chain = mine_chain(base.hash(), 3, 1);

        let events = insert_all(&client, &mut store, &chain);

        let heights: Vec<_> = events
            .iter()
            .map(|event| match event {
                ChainEvent::RollForward(info) => info.height(),
                ChainEvent::RollBack(_) => panic!("no rollback expected"),
            })
            .collect();
        assert_eq!(heights, vec![101, 102, 103]);

        let tip = client.tip(&store).unwrap();
        assert_eq!(tip.hash(), chain[2].block_hash());
        assert_eq!(
            tip.cumulative_work(),
            base.cumulative_work() + chain[0].work() + chain[1].work() + chain[2].work()
        );
    }

    #[test]
    fn test_rejections_leave_chain_unchanged() {
        let (client, mut store, base) = setup();
        let chain = mine_chain(base.hash(), 1, 1);
        client.insert_header(&mut store, chain[0]).unwrap();
        let snapshot = store.clone();

        assert!(matches!(
            client.insert_header(&mut store, chain[0]),
            Err(HeaderError::Duplicate(_))
        ));

        let orphan = mine_header(BlockHash::all_zeros(), TxMerkleNode::all_zeros(), 99);
        let orphan = Header {
            prev_blockhash: BlockHash::from_byte_array([7; 32]),
            ..orphan
        };
        assert!(matches!(
            client.insert_header(&mut store, orphan),
            Err(HeaderError::UnknownParent(_))
        ));

        let mut bad_bits = mine_header(base.hash(), TxMerkleNode::all_zeros(), 5);
        bad_bits.bits = CompactTarget::from_consensus(0x2100_ffff);
        assert!(matches!(
            client.insert_header(&mut store, bad_bits),
            Err(HeaderError::InvalidTarget { .. })
        ));

        // grind for a nonce that does *not* meet the target
        let mut weak = mine_header(base.hash(), TxMerkleNode::all_zeros(), 6);
        while weak.validate_pow(weak.target()).is_ok() {
            weak.nonce += 1;
        }
        assert!(matches!(
            client.insert_header(&mut store, weak),
            Err(HeaderError::InvalidProofOfWork(_))
        ));

        assert_eq!(store, snapshot, "rejected headers must not touch the store");
    }

    #[test]
    fn test_reorg_event_ordering() {
        let (client, mut store, base) = setup();

        // fork point at height 101
        let common = mine_chain(base.hash(), 1, 1);
        insert_all(&client, &mut store, &common);
        let fork_hash = common[0].block_hash();

        let chain_a = mine_chain(fork_hash, 5, 100);
        insert_all(&client, &mut store, &chain_a);
        assert_eq!(client.tip(&store).unwrap().hash(), chain_a[4].block_hash());

        let chain_b = mine_chain(fork_hash, 8, 200);
        let events = insert_all(&client, &mut store, &chain_b);

        // B only overtakes A at its 6th header, which triggers the whole switch at once
        let rollbacks: Vec<_> = events
            .iter()
            .take_while(|event| matches!(event, ChainEvent::RollBack(_)))
            .map(|event| event.header().hash())
            .collect();
        let expected_rollbacks: Vec<_> = chain_a.iter().rev().map(|h| h.block_hash()).collect();
        assert_eq!(rollbacks, expected_rollbacks);

        let rollforwards: Vec<_> = events
            .iter()
            .skip(rollbacks.len())
            .map(|event| match event {
                ChainEvent::RollForward(info) => info.hash(),
                ChainEvent::RollBack(_) => panic!("rollbacks must precede every rollforward"),
            })
            .collect();
        let expected_rollforwards: Vec<_> = chain_b.iter().map(|h| h.block_hash()).collect();
        assert_eq!(rollforwards, expected_rollforwards);

        let tip = client.tip(&store).unwrap();
        assert_eq!(tip.hash(), chain_b[7].block_hash());

        // superseded headers are kept but no longer canonical
        let old = client
            .header_by_hash(&store, &chain_a[0].block_hash())
            .unwrap()
            .expect("old headers are retained");
        assert!(!client.is_canonical(&store, &old).unwrap());
        assert_eq!(
            client.header_at_height(&store, 102).unwrap().unwrap().hash(),
            chain_b[0].block_hash()
        );
    }

    #[test]
    fn test_equal_work_keeps_first_seen_tip() {
        let (client, mut store, base) = setup();

        let chain_a = mine_chain(base.hash(), 2, 1);
        let chain_b = mine_chain(base.hash(), 2, 50);
        insert_all(&client, &mut store, &chain_a);
        let events = insert_all(&client, &mut store, &chain_b);

        assert!(events.is_empty());
        assert_eq!(client.tip(&store).unwrap().hash(), chain_a[1].block_hash());
    }

    #[test]
    fn test_confirmation_depth_follows_canonical_tip() {
        let (client, mut store, base) = setup();
        let chain = mine_chain(base.hash(), 6, 1);
        insert_all(&client, &mut store, &chain);

        let first = chain[0].block_hash();
        assert_eq!(client.main_chain_depth(&store, &first).unwrap(), Some(5));
        assert!(client.is_confirmed(&store, &first, 5).unwrap());
        assert!(!client.is_confirmed(&store, &first, 6).unwrap());

        // a heavier fork from the base orphans the whole chain
        let fork = mine_chain(base.hash(), 7, 500);
        insert_all(&client, &mut store, &fork);
        assert_eq!(client.main_chain_depth(&store, &first).unwrap(), None);
        assert!(!client.is_confirmed(&store, &first, 0).unwrap());
    }

    #[test]
    fn test_init_twice_fails() {
        let (client, mut store, _) = setup();

        assert!(matches!(
            client.init_base(&mut store, base_header(), 0),
            Err(HeaderError::AlreadyInitialized)
        ));
    }
}
