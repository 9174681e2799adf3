//! SECP256K1 primitives.

use std::ops::Deref;

use secp256k1::{Keypair, Parity, SecretKey, XOnlyPublicKey, SECP256K1};

/// A secret key that is guaranteed to have an even x-only public key.
///
/// BIP340 keys are x-only and implicitly even, so every secret that is used as the discrete log
/// of an x-only key (signing keys, adaptor secrets, extracted EOTS keys) goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvenSecretKey(SecretKey);

impl EvenSecretKey {
    /// Returns the x-only public key of this secret.
    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.0.x_only_public_key(SECP256K1).0
    }

    /// Returns the keypair of this secret.
    pub fn keypair(&self) -> Keypair {
        Keypair::from_secret_key(SECP256K1, &self.0)
    }

    /// Returns the big-endian bytes of the secret.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.0.secret_bytes()
    }
}

impl Deref for EvenSecretKey {
    type Target = SecretKey;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<SecretKey> for EvenSecretKey {
    fn as_ref(&self) -> &SecretKey {
        &self.0
    }
}

impl From<SecretKey> for EvenSecretKey {
    fn from(value: SecretKey) -> Self {
        match value.x_only_public_key(SECP256K1).1 == Parity::Odd {
            true => Self(value.negate()),
            false => Self(value),
        }
    }
}

impl From<EvenSecretKey> for SecretKey {
    fn from(value: EvenSecretKey) -> Self {
        value.0
    }
}
