//! Public randomness commitments.
//!
//! Before voting on a range of heights, a provider commits to the public randomness it will use
//! for each of them. A vote is only valid if its randomness opens the commitment covering its
//! height, which pins every vote at that height to the same nonce.

use std::fmt;

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_params::FinalityParams;
use btc_staking_primitives::{secp::EvenSecretKey, types::BlockHeight};
use secp256k1::{schnorr, Message, XOnlyPublicKey, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::{FinalityError, FinalityResult};

/// A provider's commitment to the randomness of `num_pub_rand` consecutive heights.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubRandCommit {
    /// The committing provider.
    pub fp_pk: XOnlyPublicKey,

    /// First height covered.
    pub start_height: BlockHeight,

    /// Number of heights covered.
    pub num_pub_rand: u64,

    /// Merkle root over the committed randomness, see [`crate::merkle`].
    #[serde(with = "hex::serde")]
    pub root: [u8; 32],
}

impl PubRandCommit {
    /// Returns the last height covered.
    ///
    /// Only meaningful for commitments that passed validation, which rules out overflow.
    pub const fn end_height(&self) -> BlockHeight {
        self.start_height + self.num_pub_rand - 1
    }

    /// Returns `true` if `height` is covered.
    pub const fn covers(&self, height: BlockHeight) -> bool {
        self.start_height <= height && height <= self.end_height()
    }

    /// Returns the position of `height`'s randomness in the committed list.
    pub const fn index_of(&self, height: BlockHeight) -> Option<u64> {
        if self.covers(height) {
            Some(height - self.start_height)
        } else {
            None
        }
    }

    /// The message a provider signs to authorize this commitment.
    pub fn signing_message(&self) -> Message {
        let digest = Sha256::new()
            .chain_update(self.start_height.to_be_bytes())
            .chain_update(self.num_pub_rand.to_be_bytes())
            .chain_update(self.root)
            .finalize();

        Message::from_digest(digest.into())
    }

    /// Signs this commitment with the provider's key.
    pub fn sign(&self, fp_sk: &EvenSecretKey) -> schnorr::Signature {
        SECP256K1.sign_schnorr(&self.signing_message(), &fp_sk.keypair())
    }
}

impl fmt::Debug for PubRandCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubRandCommit")
            .field("fp_pk", &self.fp_pk)
            .field("start_height", &self.start_height)
            .field("num_pub_rand", &self.num_pub_rand)
            .field("root", &hex::encode(self.root))
            .finish()
    }
}

/// A commitment submitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCommitPubRand {
    /// The commitment.
    pub commit: PubRandCommit,

    /// The provider's signature over [`PubRandCommit::signing_message`].
    pub sig: schnorr::Signature,
}

impl MsgCommitPubRand {
    /// Builds and signs a commitment.
    pub fn new(fp_sk: &EvenSecretKey, start_height: BlockHeight, num_pub_rand: u64, root: [u8; 32]) -> Self {
        let commit = PubRandCommit {
            fp_pk: fp_sk.x_only_public_key(),
            start_height,
            num_pub_rand,
            root,
        };
        let sig = commit.sign(fp_sk);

        Self { commit, sig }
    }
}

/// Validates `msg` against the provider's earlier commitments and stores it.
pub fn commit_pub_rand<S: KvStore + ?Sized>(
    store: &mut S,
    params: &FinalityParams,
    msg: &MsgCommitPubRand,
) -> FinalityResult<()> {
    let commit = &msg.commit;

    if commit.num_pub_rand < params.min_pub_rand {
        warn!(fp_pk = %commit.fp_pk, num = commit.num_pub_rand, "rejecting undersized commitment");
        return Err(FinalityError::CommitmentTooSmall {
            num: commit.num_pub_rand,
            min: params.min_pub_rand,
        });
    }

    if commit.start_height.checked_add(commit.num_pub_rand).is_none() {
        return Err(FinalityError::HeightOverflow);
    }

    if let Some(last) = last_commitment(store, &commit.fp_pk)? {
        if commit.start_height <= last.end_height() {
            warn!(fp_pk = %commit.fp_pk, start = commit.start_height, last_end = last.end_height(), "rejecting overlapping commitment");
            return Err(FinalityError::OverlappingCommitment {
                start: commit.start_height,
                last_end: last.end_height(),
            });
        }
    }

    if SECP256K1
        .verify_schnorr(&msg.sig, &commit.signing_message(), &commit.fp_pk)
        .is_err()
    {
        warn!(fp_pk = %commit.fp_pk, "rejecting unsigned commitment");
        return Err(FinalityError::InvalidCommitmentSig(commit.fp_pk));
    }

    store.put_typed(
        Key::new(prefix::PUB_RAND_COMMIT)
            .push(commit.fp_pk.serialize())
            .push_u64(commit.start_height)
            .as_bytes(),
        commit,
    )?;

    debug!(fp_pk = %commit.fp_pk, start = commit.start_height, end = commit.end_height(), "committed public randomness");

    Ok(())
}

/// Returns the provider's commitment with the highest start height.
pub fn last_commitment<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> FinalityResult<Option<PubRandCommit>> {
    let prefix = Key::new(prefix::PUB_RAND_COMMIT).push(fp_pk.serialize());

    Ok(store
        .iterate_typed::<PubRandCommit>(prefix.as_bytes())?
        .pop()
        .map(|(_, commit)| commit))
}

/// Returns the provider's commitment covering `height`.
pub fn commitment_at<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
) -> FinalityResult<Option<PubRandCommit>> {
    let prefix = Key::new(prefix::PUB_RAND_COMMIT).push(fp_pk.serialize());

    // commitments never overlap, so the last one starting at or below `height` is the only
    // candidate
    Ok(store
        .iterate_typed::<PubRandCommit>(prefix.as_bytes())?
        .into_iter()
        .map(|(_, commit)| commit)
        .take_while(|commit| commit.start_height <= height)
        .last()
        .filter(|commit| commit.covers(height)))
}
