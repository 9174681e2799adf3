//! Re-exports of the script helpers used by the transaction builders.

pub use super::{general::*, taproot::*};
