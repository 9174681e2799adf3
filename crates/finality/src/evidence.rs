//! Evidence of double voting.

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_eots::{extract, EotsError, EotsSignature, PubRand};
use btc_staking_primitives::{
    secp::EvenSecretKey,
    types::{AppHash, BlockHeight},
};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{FinalityError, FinalityResult},
    vote::vote_message,
};

/// Two votes by the same provider at the same height for different blocks.
///
/// Both votes share the committed randomness, so together they reveal the provider's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// The equivocating provider.
    pub fp_pk: XOnlyPublicKey,

    /// The height both votes are for.
    pub height: BlockHeight,

    /// The randomness both votes use.
    pub pub_rand: PubRand,

    /// The block of the vote recorded first.
    pub voted_app_hash: AppHash,

    /// The signature of the vote recorded first.
    pub voted_sig: EotsSignature,

    /// The block of the conflicting vote.
    pub conflicting_app_hash: AppHash,

    /// The signature of the conflicting vote.
    pub conflicting_sig: EotsSignature,
}

impl Evidence {
    /// Recovers the provider's secret key.
    pub fn extract_sk(&self) -> FinalityResult<EvenSecretKey> {
        extract(
            &self.fp_pk,
            &self.pub_rand,
            &vote_message(self.height, &self.voted_app_hash),
            &self.voted_sig,
            &vote_message(self.height, &self.conflicting_app_hash),
            &self.conflicting_sig,
        )
        .map_err(|e| match e {
            EotsError::NotConflicting => FinalityError::NotConflicting,
            e => e.into(),
        })
    }
}

/// Checks whether two votes conflict and, if they do, builds the evidence.
///
/// Deterministic: identical inputs always yield the same result. The returned evidence is known
/// to extract the signer's key.
///
/// # Errors
///
/// [`FinalityError::NotConflicting`] if both votes are for the same block, or an EOTS error if
/// either signature is invalid.
pub fn detect_and_extract(
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
    pub_rand: &PubRand,
    (app_hash_a, sig_a): (&AppHash, &EotsSignature),
    (app_hash_b, sig_b): (&AppHash, &EotsSignature),
) -> FinalityResult<(Evidence, EvenSecretKey)> {
    if app_hash_a == app_hash_b {
        return Err(FinalityError::NotConflicting);
    }

    let evidence = Evidence {
        fp_pk: *fp_pk,
        height,
        pub_rand: *pub_rand,
        voted_app_hash: *app_hash_a,
        voted_sig: *sig_a,
        conflicting_app_hash: *app_hash_b,
        conflicting_sig: *sig_b,
    };
    let sk = evidence.extract_sk()?;

    Ok((evidence, sk))
}

/// Stores `evidence` unless the provider already has evidence at that height.
///
/// Returns `true` if the evidence was new.
pub fn record_evidence<S: KvStore + ?Sized>(store: &mut S, evidence: &Evidence) -> FinalityResult<bool> {
    let key = Key::new(prefix::EVIDENCE)
        .push(evidence.fp_pk.serialize())
        .push_u64(evidence.height);

    if store.get(key.as_bytes())?.is_some() {
        return Ok(false);
    }

    store.put_typed(key.as_bytes(), evidence)?;

    Ok(true)
}

/// Returns the provider's evidence at the lowest height.
pub fn first_evidence<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> FinalityResult<Option<Evidence>> {
    let prefix = Key::new(prefix::EVIDENCE).push(fp_pk.serialize());

    Ok(store
        .iterate_typed::<Evidence>(prefix.as_bytes())?
        .into_iter()
        .next()
        .map(|(_, evidence)| evidence))
}
