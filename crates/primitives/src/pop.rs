//! Proof of possession of a BTC key.
//!
//! Stakers and finality providers prove that they control the BTC key they register by signing
//! the host-chain address that owns the registration.

use bitcoin::hashes::{sha256, Hash};
use secp256k1::{schnorr, Keypair, Message, XOnlyPublicKey, SECP256K1};
use serde::{Deserialize, Serialize};

/// A BIP340 signature over `sha256(address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfPossession(schnorr::Signature);

impl ProofOfPossession {
    /// Signs `address` with `keypair`.
    pub fn new(keypair: &Keypair, address: &str) -> Self {
        Self(SECP256K1.sign_schnorr(&pop_message(address), keypair))
    }

    /// Wraps an already computed signature.
    pub const fn from_signature(sig: schnorr::Signature) -> Self {
        Self(sig)
    }

    /// Returns `true` if this proves possession of `pk` for `address`.
    pub fn verify(&self, pk: &XOnlyPublicKey, address: &str) -> bool {
        SECP256K1
            .verify_schnorr(&self.0, &pop_message(address), pk)
            .is_ok()
    }
}

fn pop_message(address: &str) -> Message {
    Message::from_digest(sha256::Hash::hash(address.as_bytes()).to_byte_array())
}
