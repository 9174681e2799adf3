//! Signing, verification and key extraction.

use std::fmt;

use btc_staking_primitives::secp::EvenSecretKey;
use k256::{ProjectivePoint, Scalar};
use secp256k1::{SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    errors::{EotsError, EotsResult},
    point::{lift_x, normalize, scalar_from_bytes, scalar_from_bytes_strict, scalar_to_bytes, tagged_hash},
    randomness::{PubRand, SecRand},
};

const CHALLENGE_TAG: &str = "BIP0340/challenge";

/// The `s` part of a Schnorr signature whose nonce is known from a randomness commitment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EotsSignature(#[serde(with = "hex::serde")] [u8; 32]);

impl EotsSignature {
    /// Parses a signature, checking that it is a canonical scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> EotsResult<Self> {
        scalar_from_bytes_strict(&bytes)?;

        Ok(Self(bytes))
    }

    /// Returns the encoded scalar.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn scalar(&self) -> EotsResult<Scalar> {
        scalar_from_bytes_strict(&self.0)
    }
}

impl fmt::Debug for EotsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EotsSignature({})", hex::encode(self.0))
    }
}

/// The BIP340 challenge over the message's hash.
fn challenge(r_x: &[u8; 32], p_x: &[u8; 32], msg: &[u8]) -> Scalar {
    let msg_hash = Sha256::digest(msg);

    scalar_from_bytes(&tagged_hash(CHALLENGE_TAG, &[r_x, p_x, &msg_hash]))
}

/// Signs `msg` with `sk` using the one-time `sec_rand`.
///
/// Never sign two different messages with the same randomness: doing so reveals `sk`.
pub fn sign(sk: &EvenSecretKey, sec_rand: &SecRand, msg: &[u8]) -> EotsResult<EotsSignature> {
    let (x, p_x) = normalize(scalar_from_bytes_strict(&sk.secret_bytes())?)?;
    let (k, r_x) = normalize(*sec_rand.scalar())?;

    let e = challenge(&r_x, &p_x, msg);
    let s = k + e * x;

    Ok(EotsSignature(scalar_to_bytes(&s)))
}

/// Verifies that `sig` is a signature by `pk` over `msg` with nonce `pub_rand`.
pub fn verify(
    pk: &XOnlyPublicKey,
    pub_rand: &PubRand,
    msg: &[u8],
    sig: &EotsSignature,
) -> EotsResult<()> {
    let p_x = pk.serialize();
    let p = lift_x(&p_x)?;
    let r = pub_rand.point()?;
    let s = sig.scalar()?;

    let e = challenge(pub_rand.as_bytes(), &p_x, msg);
    if ProjectivePoint::GENERATOR * s != r + p * e {
        return Err(EotsError::BadSignature);
    }

    Ok(())
}

/// Extracts the secret key of `pk` from two signatures over different messages that share
/// `pub_rand`.
///
/// Both signatures are verified first, so the result is always the signer's key.
///
/// # Errors
///
/// [`EotsError::NotConflicting`] if the messages are the same and [`EotsError::BadSignature`] if
/// either signature does not verify.
pub fn extract(
    pk: &XOnlyPublicKey,
    pub_rand: &PubRand,
    msg_a: &[u8],
    sig_a: &EotsSignature,
    msg_b: &[u8],
    sig_b: &EotsSignature,
) -> EotsResult<EvenSecretKey> {
    if msg_a == msg_b {
        return Err(EotsError::NotConflicting);
    }

    verify(pk, pub_rand, msg_a, sig_a)?;
    verify(pk, pub_rand, msg_b, sig_b)?;

    let p_x = pk.serialize();
    let e_a = challenge(pub_rand.as_bytes(), &p_x, msg_a);
    let e_b = challenge(pub_rand.as_bytes(), &p_x, msg_b);

    // s_a - s_b = (e_a - e_b) * x
    let denominator: Option<Scalar> = (e_a - e_b).invert().into();
    let denominator = denominator.ok_or(EotsError::NotConflicting)?;
    let x = (sig_a.scalar()? - sig_b.scalar()?) * denominator;

    let (x, x_pk) = normalize(x)?;
    if x_pk != p_x {
        return Err(EotsError::ExtractionMismatch);
    }

    let sk = SecretKey::from_slice(&scalar_to_bytes(&x)).map_err(|_| EotsError::InvalidScalar)?;

    Ok(sk.into())
}
