//! Module for test-utilities related to `musig2`.

use bitcoin::key::rand::{rngs::OsRng, Rng};
use musig2::NonceSeed;

const NONCE_SEED_SIZE: usize = 32;

/// Generates a random nonce seed, e.g., for adaptor signing.
pub fn generate_nonce_seed() -> NonceSeed {
    let mut nonce_seed_bytes = [0u8; NONCE_SEED_SIZE];
    OsRng.fill(&mut nonce_seed_bytes);

    NonceSeed::from(nonce_seed_bytes)
}
