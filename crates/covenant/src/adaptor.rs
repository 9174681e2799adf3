//! Adaptor signatures encrypted under a finality provider's key.
//!
//! The encryption point of an x-only key is its even-parity lift, so the matching decryption
//! secret is always an [`EvenSecretKey`].

use btc_staking_primitives::secp::EvenSecretKey;
pub use musig2::AdaptorSignature;
use musig2::{
    adaptor,
    secp::{MaybeScalar, Point, Scalar},
    BinaryEncoding, LiftedSignature, NonceSeed,
};
use secp256k1::{schnorr, Message, Parity, PublicKey, SecretKey, XOnlyPublicKey};
use tracing::trace;

use crate::errors::{CovenantError, CovenantResult};

/// Lifts an x-only key to the even-parity curve point used as the adaptor point.
pub fn encryption_point(encryption_key: &XOnlyPublicKey) -> Point {
    PublicKey::from_x_only_public_key(*encryption_key, Parity::Even).into()
}

/// Produces an adaptor signature over `sighash` that can only be completed with the secret key
/// of `encryption_key`.
pub fn encrypt_sign(
    signer: &EvenSecretKey,
    sighash: &Message,
    encryption_key: &XOnlyPublicKey,
    nonce_seed: impl Into<NonceSeed>,
) -> AdaptorSignature {
    let seckey = Scalar::from(SecretKey::from(*signer));

    adaptor::sign_solo(
        seckey,
        &sighash[..],
        nonce_seed,
        encryption_point(encryption_key),
    )
}

/// Returns `true` if `sig` is a valid adaptor signature by `member_pk` over `sighash`, encrypted
/// under `encryption_key`.
pub fn verify_adaptor_sig(
    member_pk: &XOnlyPublicKey,
    sig: &AdaptorSignature,
    sighash: &Message,
    encryption_key: &XOnlyPublicKey,
) -> bool {
    let pubkey: Point = PublicKey::from_x_only_public_key(*member_pk, Parity::Even).into();

    let result = adaptor::verify_single(pubkey, sig, &sighash[..], encryption_point(encryption_key));
    if let Err(e) = &result {
        trace!(%member_pk, %encryption_key, ?e, "adaptor signature rejected");
    }

    result.is_ok()
}

/// Completes `sig` into a BIP340 signature using the decryption secret.
///
/// # Errors
///
/// If the completed signature is degenerate.
pub fn decrypt(
    sig: &AdaptorSignature,
    decryption_key: &EvenSecretKey,
) -> CovenantResult<schnorr::Signature> {
    let secret = Scalar::from(SecretKey::from(*decryption_key));

    let lifted: LiftedSignature = sig.adapt(secret).ok_or(CovenantError::AdaptFailed)?;

    schnorr::Signature::from_slice(&lifted.to_bytes())
        .map_err(|e| CovenantError::MalformedSignature(e.to_string()))
}

/// Recovers the decryption secret from an adaptor signature and its completed form.
///
/// The recovered secret is checked against `encryption_key`, so a signature that was not
/// produced by completing `sig` is rejected.
///
/// # Errors
///
/// If `completed` cannot be decoded or does not reveal the secret of `encryption_key`.
pub fn recover_decryption_key(
    sig: &AdaptorSignature,
    completed: &schnorr::Signature,
    encryption_key: &XOnlyPublicKey,
) -> CovenantResult<EvenSecretKey> {
    let lifted = LiftedSignature::from_bytes(&completed.serialize())
        .map_err(|e| CovenantError::MalformedSignature(e.to_string()))?;

    let secret: MaybeScalar = sig
        .reveal_secret(&lifted)
        .ok_or(CovenantError::SecretNotRevealed)?;

    let secret = SecretKey::from_slice(&secret.serialize())
        .map_err(|_| CovenantError::SecretNotRevealed)?;
    let secret = EvenSecretKey::from(secret);

    if secret.x_only_public_key() != *encryption_key {
        return Err(CovenantError::SecretNotRevealed);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use btc_staking_test_utils::prelude::*;
    use secp256k1::SECP256K1;

    use super::*;

    fn sighash(byte: u8) -> Message {
        Message::from_digest([byte; 32])
    }

    #[test]
    fn test_adaptor_signature_binds_signer_message_and_key() {
        let member = generate_even_secret_key();
        let fp = generate_even_secret_key();
        let msg = sighash(1);

        let sig = encrypt_sign(&member, &msg, &fp.x_only_public_key(), generate_nonce_seed());

        assert!(verify_adaptor_sig(
            &member.x_only_public_key(),
            &sig,
            &msg,
            &fp.x_only_public_key()
        ));
        assert!(
            !verify_adaptor_sig(&generate_xonly_pubkey(), &sig, &msg, &fp.x_only_public_key()),
            "other signer"
        );
        assert!(
            !verify_adaptor_sig(&member.x_only_public_key(), &sig, &sighash(2), &fp.x_only_public_key()),
            "other message"
        );
        assert!(
            !verify_adaptor_sig(&member.x_only_public_key(), &sig, &msg, &generate_xonly_pubkey()),
            "other encryption key"
        );
    }

    #[test]
    fn test_decrypt_and_recover() {
        let member = generate_even_secret_key();
        let fp = generate_even_secret_key();
        let msg = sighash(3);

        let sig = encrypt_sign(&member, &msg, &fp.x_only_public_key(), generate_nonce_seed());
        let completed = decrypt(&sig, &fp).expect("must complete");

        SECP256K1
            .verify_schnorr(&completed, &msg, &member.x_only_public_key())
            .expect("completed signature must verify under the member key");

        let recovered =
            recover_decryption_key(&sig, &completed, &fp.x_only_public_key()).expect("must recover");
        assert_eq!(recovered, fp);
    }

    #[test]
    fn test_recover_rejects_unrelated_signature() {
        let member = generate_even_secret_key();
        let fp = generate_even_secret_key();
        let msg = sighash(4);

        let sig = encrypt_sign(&member, &msg, &fp.x_only_public_key(), generate_nonce_seed());
        let unrelated = SECP256K1.sign_schnorr(&msg, &member.keypair());

        assert!(recover_decryption_key(&sig, &unrelated, &fp.x_only_public_key()).is_err());
    }
}
