//! Re-exports of the commonly used test utilities.

pub use crate::{bitcoin::*, musig2::*};
