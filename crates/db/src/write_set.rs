//! Buffered writes that are applied to a store atomically or not at all.
//!
//! The host wraps every block in a [`WriteSet`]: reads go through an [`Overlay`] that sees the
//! buffered writes on top of the committed state, and the buffer is only flushed once the block
//! completes. Write sets nest, so a single message can be buffered on top of its block and
//! dropped on rejection.

use std::collections::BTreeMap;

use tracing::trace;

use crate::{errors::DbResult, store::KvStore};

/// Pending writes; `None` marks a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteSet {
    /// Creates an empty write set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of buffered writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies every buffered write to `store`.
    pub fn commit<S: KvStore + ?Sized>(self, store: &mut S) -> DbResult<()> {
        trace!(writes = self.writes.len(), "committing write set");

        for (key, value) in self.writes {
            match value {
                Some(value) => store.set(&key, value)?,
                None => store.delete(&key)?,
            }
        }

        Ok(())
    }

    /// Drops every buffered write.
    pub fn discard(self) {
        trace!(writes = self.writes.len(), "discarding write set");
    }
}

/// A read-through view of `base` with `writes` layered on top.
#[derive(Debug)]
pub struct Overlay<'a, S: ?Sized> {
    base: &'a S,
    writes: &'a mut WriteSet,
}

impl<'a, S: KvStore + ?Sized> Overlay<'a, S> {
    /// Layers `writes` on top of `base`.
    pub fn new(base: &'a S, writes: &'a mut WriteSet) -> Self {
        Self { base, writes }
    }
}

impl<S: KvStore + ?Sized> KvStore for Overlay<'_, S> {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        match self.writes.writes.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> DbResult<()> {
        self.writes.writes.insert(key.to_vec(), Some(value));

        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.writes.writes.insert(key.to_vec(), None);

        Ok(())
    }

    fn iterate(&self, prefix: &[u8]) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.base.iterate(prefix)?.into_iter().collect();

        let pending = self
            .writes
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, value) in pending {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }
}
