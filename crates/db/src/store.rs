//! The key-value interface the host provides, plus typed accessors on top of it.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::DbResult;

/// An ordered key-value store.
///
/// This is the only storage interface the staking core consumes. Keys are compared bytewise, so
/// big-endian encoded integers iterate in numeric order.
pub trait KvStore {
    /// Returns the value stored under `key`.
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> DbResult<()>;

    /// Removes `key`.
    fn delete(&mut self, key: &[u8]) -> DbResult<()>;

    /// Returns every entry whose key starts with `prefix`, in ascending key order.
    fn iterate(&self, prefix: &[u8]) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Serde-aware accessors for any [`KvStore`].
pub trait TypedKvExt: KvStore {
    /// Reads and decodes the value under `key`.
    fn get_typed<T: DeserializeOwned>(&self, key: &[u8]) -> DbResult<Option<T>> {
        self.get(key)?.map(|raw| decode(&raw)).transpose()
    }

    /// Encodes and writes `value` under `key`.
    fn put_typed<T: Serialize>(&mut self, key: &[u8], value: &T) -> DbResult<()> {
        self.set(key, encode(value)?)
    }

    /// Reads and decodes every value under `prefix`, in key order.
    fn iterate_typed<T: DeserializeOwned>(&self, prefix: &[u8]) -> DbResult<Vec<(Vec<u8>, T)>> {
        self.iterate(prefix)?
            .into_iter()
            .map(|(key, raw)| Ok((key, decode(&raw)?)))
            .collect()
    }
}

impl<S: KvStore + ?Sized> TypedKvExt for S {}

/// Encodes `value` with the store's codec.
pub fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Decodes `raw` with the store's codec.
pub fn decode<T: DeserializeOwned>(raw: &[u8]) -> DbResult<T> {
    Ok(bincode::deserialize(raw)?)
}
