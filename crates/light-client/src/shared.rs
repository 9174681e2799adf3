//! A light client shared between threads.

use std::sync::Arc;

use bitcoin::{block::Header, BlockHash};
use btc_staking_db::KvStore;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    chain::BtcLightClient,
    errors::HeaderResult,
    events::ChainEvent,
    header::BtcHeaderInfo,
};

#[derive(Debug)]
struct Inner<S> {
    client: BtcLightClient,
    store: S,
}

/// A [`BtcLightClient`] bundled with its store behind a lock.
///
/// Insertions are serialized, so concurrent relayers observe a single linear history of chain
/// events. Cloning yields another handle to the same chain.
#[derive(Debug)]
pub struct SharedLightClient<S> {
    inner: Arc<Mutex<Inner<S>>>,
}

impl<S> Clone for SharedLightClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KvStore> SharedLightClient<S> {
    /// Wraps `client` and `store`.
    pub fn new(client: BtcLightClient, store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { client, store })),
        }
    }

    /// Inserts `headers` in order, stopping at the first rejected one.
    ///
    /// Headers accepted before a rejection stay inserted; the events they produced are lost
    /// along with the error, so callers should re-read the tip.
    pub fn insert_headers(&self, headers: &[Header]) -> HeaderResult<Vec<ChainEvent>> {
        let mut guard = self.inner.lock();
        let Inner { client, store } = &mut *guard;

        let mut events = Vec::new();
        for header in headers {
            events.extend(client.insert_header(store, *header)?);
        }

        debug!(num_headers = headers.len(), num_events = events.len(), "inserted headers");

        Ok(events)
    }

    /// Returns the canonical tip.
    pub fn tip(&self) -> HeaderResult<BtcHeaderInfo> {
        let guard = self.inner.lock();

        guard.client.tip(&guard.store)
    }

    /// Returns the number of canonical blocks on top of `hash`.
    pub fn main_chain_depth(&self, hash: &BlockHash) -> HeaderResult<Option<u64>> {
        let guard = self.inner.lock();

        guard.client.main_chain_depth(&guard.store, hash)
    }

    /// Runs `f` with exclusive access to the client and its store.
    pub fn with_store<R>(&self, f: impl FnOnce(&BtcLightClient, &mut S) -> R) -> R {
        let mut guard = self.inner.lock();
        let Inner { client, store } = &mut *guard;

        f(client, store)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use bitcoin::Network;
    use btc_staking_db::InMemoryStore;
    use btc_staking_test_utils::prelude::*;
    use proptest::prelude::*;

    use super::*;
    use crate::errors::HeaderError;

    fn setup() -> (SharedLightClient<InMemoryStore>, BtcHeaderInfo) {
        let client = BtcLightClient::new(Network::Regtest);
        let mut store = InMemoryStore::new();
        let base = client
            .init_base(&mut store, base_header(), 0)
            .expect("must init");

        (SharedLightClient::new(client, store), base)
    }

    #[test]
    fn test_concurrent_relayers_converge() {
        let (shared, base) = setup();

        let chains = (0..4u32)
            .map(|salt| mine_chain(base.hash(), 3 + salt as usize, salt * 1000))
            .collect::<Vec<_>>();

        let handles = chains
            .iter()
            .cloned()
            .map(|chain| {
                let shared = shared.clone();
                thread::spawn(move || shared.insert_headers(&chain).expect("must insert"))
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("relayer must not panic");
        }

        let longest = chains.last().expect("has chains").last().expect("non-empty");
        let tip = shared.tip().expect("must have tip");
        assert_eq!(tip.hash(), longest.block_hash());
        assert_eq!(tip.height(), 6);
        assert_eq!(shared.main_chain_depth(&base.hash()).unwrap(), Some(6));
    }

    #[test]
    fn test_insert_stops_at_first_rejection() {
        let (shared, base) = setup();

        let mut chain = mine_chain(base.hash(), 3, 0);
        chain.insert(1, chain[0]);

        let err = shared.insert_headers(&chain).unwrap_err();
        assert!(matches!(err, HeaderError::Duplicate(_)));
        assert_eq!(shared.tip().unwrap().hash(), chain[0].block_hash());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn heavier_fork_wins_regardless_of_arrival(len_a in 1usize..6, len_b in 1usize..6, b_first: bool) {
            let (shared, base) = setup();
            let chain_a = mine_chain(base.hash(), len_a, 0);
            let chain_b = mine_chain(base.hash(), len_b, 10_000);

            if b_first {
                shared.insert_headers(&chain_b).unwrap();
                shared.insert_headers(&chain_a).unwrap();
            } else {
                shared.insert_headers(&chain_a).unwrap();
                shared.insert_headers(&chain_b).unwrap();
            }

            let tip = shared.tip().unwrap();
            let expected = match len_a.cmp(&len_b) {
                std::cmp::Ordering::Greater => chain_a.last().unwrap(),
                std::cmp::Ordering::Less => chain_b.last().unwrap(),
                std::cmp::Ordering::Equal if b_first => chain_b.last().unwrap(),
                std::cmp::Ordering::Equal => chain_a.last().unwrap(),
            };
            prop_assert_eq!(tip.hash(), expected.block_hash());
            prop_assert_eq!(tip.height(), len_a.max(len_b) as u64);
        }
    }
}
