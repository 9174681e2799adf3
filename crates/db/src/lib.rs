//! Storage for the staking core.
//!
//! The host owns the actual database; this crate only defines the narrow [`KvStore`] interface
//! the core consumes, an in-memory implementation, the key layout, and the per-block
//! [`WriteSet`] that makes block processing all-or-nothing.

pub mod errors;
pub mod inmemory;
pub mod keys;
pub mod store;
pub mod write_set;

pub use errors::{DbError, DbResult};
pub use inmemory::InMemoryStore;
pub use keys::Key;
pub use store::{KvStore, TypedKvExt};
pub use write_set::{Overlay, WriteSet};
