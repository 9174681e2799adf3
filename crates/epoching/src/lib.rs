//! Epoch bookkeeping.
//!
//! Host blocks are grouped into epochs of a configurable number of blocks. Changing the interval
//! never shortens or stretches the epoch in progress.

pub mod epoch;
pub mod errors;

pub use epoch::{Epoch, EpochNumber};
pub use errors::{EpochingError, EpochingResult};
