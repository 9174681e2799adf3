//! One-time nonces and their public commitments.

use std::fmt;

use btc_staking_primitives::secp::EvenSecretKey;
use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{EotsError, EotsResult},
    point::{lift_x, normalize, scalar_from_bytes, scalar_from_bytes_strict, scalar_to_bytes, tagged_hash},
};

const RANDOMNESS_TAG: &str = "EOTS/randomness";

/// Secret randomness, i.e., the nonce of an EOTS.
///
/// It is normalized so that its public point has even y.
#[derive(Clone, PartialEq, Eq)]
pub struct SecRand {
    scalar: Scalar,
    pub_rand: PubRand,
}

impl SecRand {
    /// Parses secret randomness.
    pub fn from_bytes(bytes: &[u8; 32]) -> EotsResult<Self> {
        let scalar = scalar_from_bytes_strict(bytes)?;
        if bool::from(scalar.is_zero()) {
            return Err(EotsError::InvalidScalar);
        }

        let (scalar, x) = normalize(scalar)?;

        Ok(Self {
            scalar,
            pub_rand: PubRand(x),
        })
    }

    /// Deterministically derives the randomness `sk` uses at `height` under `context`.
    ///
    /// The context separates independent uses of the same key, e.g., different chains.
    pub fn derive(sk: &EvenSecretKey, context: &[u8], height: u64) -> Self {
        let mut counter = 0u32;
        loop {
            let bytes = tagged_hash(
                RANDOMNESS_TAG,
                &[
                    &sk.secret_bytes(),
                    context,
                    &height.to_be_bytes(),
                    &counter.to_be_bytes(),
                ],
            );

            let scalar = scalar_from_bytes(&bytes);
            if let Ok((scalar, x)) = normalize(scalar) {
                return Self {
                    scalar,
                    pub_rand: PubRand(x),
                };
            }

            // zero after reduction; unreachable in practice
            counter += 1;
        }
    }

    /// Returns the public randomness.
    pub const fn pub_rand(&self) -> PubRand {
        self.pub_rand
    }

    /// Returns the secret bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        scalar_to_bytes(&self.scalar)
    }

    pub(crate) const fn scalar(&self) -> &Scalar {
        &self.scalar
    }
}

impl fmt::Debug for SecRand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecRand(..)")
    }
}

/// Public randomness: the x-only encoding of an EOTS nonce point.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PubRand(#[serde(with = "hex::serde")] [u8; 32]);

impl PubRand {
    /// Parses public randomness, checking that it is on the curve.
    pub fn from_bytes(bytes: [u8; 32]) -> EotsResult<Self> {
        lift_x(&bytes)?;

        Ok(Self(bytes))
    }

    /// Returns the x-only encoding.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn point(&self) -> EotsResult<ProjectivePoint> {
        lift_x(&self.0)
    }
}

impl fmt::Display for PubRand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PubRand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubRand({self})")
    }
}
