//! In-memory implementation of [`KvStore`].

use std::collections::BTreeMap;

use crate::{errors::DbResult, store::KvStore};

/// A [`KvStore`] backed by a [`BTreeMap`].
///
/// Used by tests and by hosts that keep the staking state in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> DbResult<()> {
        self.entries.insert(key.to_vec(), value);

        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.entries.remove(key);

        Ok(())
    }

    fn iterate(&self, prefix: &[u8]) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
