//! Conversions between byte encodings and `k256` types.

use k256::{
    elliptic_curve::{bigint::ArrayEncoding, ops::Reduce, sec1::ToEncodedPoint, PrimeField},
    AffinePoint, FieldBytes, ProjectivePoint, PublicKey, Scalar, U256,
};
use sha2::{Digest, Sha256};

use crate::errors::{EotsError, EotsResult};

/// Lifts an x-only encoding to the point with even y.
pub(crate) fn lift_x(x: &[u8; 32]) -> EotsResult<ProjectivePoint> {
    let mut sec1 = [0u8; 33];
    sec1[0] = 0x02;
    sec1[1..].copy_from_slice(x);

    let pk = PublicKey::from_sec1_bytes(&sec1).map_err(|_| EotsError::InvalidPoint)?;

    Ok(pk.to_projective())
}

/// Returns the x-only encoding of `point` and whether its y is even, or `None` for the identity.
pub(crate) fn x_only(point: &ProjectivePoint) -> Option<([u8; 32], bool)> {
    let encoded = AffinePoint::from(*point).to_encoded_point(true);
    let bytes = encoded.as_bytes();
    if bytes.len() != 33 {
        return None;
    }

    let mut x = [0u8; 32];
    x.copy_from_slice(&bytes[1..]);

    Some((x, bytes[0] == 0x02))
}

/// Parses a canonical scalar.
pub(crate) fn scalar_from_bytes_strict(bytes: &[u8; 32]) -> EotsResult<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::from(*bytes))).ok_or(EotsError::InvalidScalar)
}

/// Reduces 32 bytes modulo the curve order.
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Scalar {
    Scalar::reduce(U256::from_be_byte_array((*bytes).into()))
}

pub(crate) fn scalar_to_bytes(s: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&s.to_bytes());
    out
}

/// Negates `secret` if its public point has odd y, returning the normalized secret and the
/// x-only encoding of its point.
pub(crate) fn normalize(secret: Scalar) -> EotsResult<(Scalar, [u8; 32])> {
    let point = ProjectivePoint::GENERATOR * secret;
    let (x, even) = x_only(&point).ok_or(EotsError::InvalidScalar)?;

    Ok((if even { secret } else { -secret }, x))
}

/// `SHA256(SHA256(tag) || SHA256(tag) || data...)`.
pub(crate) fn tagged_hash(tag: &str, data: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for chunk in data {
        hasher.update(chunk);
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
