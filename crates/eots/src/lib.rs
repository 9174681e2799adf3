//! Extractable one-time signatures (EOTS).
//!
//! An EOTS is a BIP340 Schnorr signature whose nonce is committed to in advance. Signing two
//! different messages with the same nonce reveals the signer's secret key, which is what makes
//! double voting slashable.
//!
//! The nonce's public point is called the *public randomness* and is identified by its x-only
//! encoding, just like BIP340 keys. Signatures only carry the `s` scalar since `R` is known from
//! the commitment.

pub mod errors;
mod point;
pub mod randomness;
pub mod sign;

pub use errors::{EotsError, EotsResult};
pub use randomness::{PubRand, SecRand};
pub use sign::{extract, sign, verify, EotsSignature};
