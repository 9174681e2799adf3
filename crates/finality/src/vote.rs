//! Finality votes.
//!
//! A vote is an EOTS signature over `height || app_hash`, made with the randomness the provider
//! committed to for that height. The state per `(provider, height)` moves from no vote to voted
//! once and never changes afterwards; a second vote for a different block is turned into
//! [`Evidence`].

use std::collections::BTreeMap;

use btc_staking_db::{keys::prefix, Key, KvStore, TypedKvExt};
use btc_staking_eots::{sign, verify, EotsSignature, PubRand, SecRand};
use btc_staking_primitives::{
    secp::EvenSecretKey,
    types::{AppHash, BlockHeight},
};
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    commitment::commitment_at,
    errors::{FinalityError, FinalityResult},
    evidence::{detect_and_extract, record_evidence, Evidence},
    merkle::PubRandProof,
};

/// Length of a vote message.
pub const VOTE_MESSAGE_LEN: usize = 8 + 32;

/// The message a provider signs to vote for `app_hash` at `height`.
pub fn vote_message(height: BlockHeight, app_hash: &AppHash) -> [u8; VOTE_MESSAGE_LEN] {
    let mut msg = [0u8; VOTE_MESSAGE_LEN];
    msg[..8].copy_from_slice(&height.to_be_bytes());
    msg[8..].copy_from_slice(app_hash.as_bytes());

    msg
}

/// A vote submitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddFinalitySig {
    /// The voting provider.
    pub fp_pk: XOnlyPublicKey,

    /// The height voted on.
    pub height: BlockHeight,

    /// The randomness the signature uses.
    pub pub_rand: PubRand,

    /// Opening of `pub_rand` against the commitment covering `height`.
    pub proof: PubRandProof,

    /// The block voted for.
    pub app_hash: AppHash,

    /// The EOTS signature over [`vote_message`].
    pub sig: EotsSignature,
}

impl MsgAddFinalitySig {
    /// Signs a vote for `app_hash` at `height`.
    pub fn sign(
        fp_sk: &EvenSecretKey,
        sec_rand: &SecRand,
        proof: PubRandProof,
        height: BlockHeight,
        app_hash: AppHash,
    ) -> FinalityResult<Self> {
        let sig = sign(fp_sk, sec_rand, &vote_message(height, &app_hash))?;

        Ok(Self {
            fp_pk: fp_sk.x_only_public_key(),
            height,
            pub_rand: sec_rand.pub_rand(),
            proof,
            app_hash,
            sig,
        })
    }
}

/// A recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityVote {
    /// The block voted for.
    pub app_hash: AppHash,

    /// The randomness used.
    pub pub_rand: PubRand,

    /// The signature.
    pub sig: EotsSignature,
}

/// What a provider did at a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    /// Nothing recorded yet.
    NoVote,

    /// A vote is recorded. Terminal.
    Voted(FinalityVote),
}

/// The result of submitting a valid vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was recorded.
    Accepted,

    /// The same vote was already recorded.
    Duplicate,

    /// The provider already voted for another block at this height.
    ///
    /// The recorded vote is kept; the key extracted from the pair is returned alongside the
    /// evidence.
    Conflicting(Box<Evidence>, EvenSecretKey),
}

/// Checks that `msg` opens the provider's randomness commitment and that its signature verifies.
pub fn verify_finality_vote<S: KvStore + ?Sized>(store: &S, msg: &MsgAddFinalitySig) -> FinalityResult<()> {
    let commit = commitment_at(store, &msg.fp_pk, msg.height)?.ok_or(FinalityError::NoCommitment {
        fp_pk: msg.fp_pk,
        height: msg.height,
    })?;

    let opens = commit.index_of(msg.height) == Some(msg.proof.index)
        && msg.proof.total == commit.num_pub_rand
        && msg.proof.verify(&commit.root, &msg.pub_rand);
    if !opens {
        warn!(fp_pk = %msg.fp_pk, height = msg.height, "vote randomness does not open the commitment");
        return Err(FinalityError::StaleCommitment(msg.height));
    }

    verify(&msg.fp_pk, &msg.pub_rand, &vote_message(msg.height, &msg.app_hash), &msg.sig).map_err(|_| {
        warn!(fp_pk = %msg.fp_pk, height = msg.height, "invalid finality signature");
        FinalityError::BadSignature(msg.fp_pk)
    })
}

/// Verifies and records `msg`.
///
/// A conflicting vote is not an error: its evidence is recorded and returned so the caller can
/// slash the provider.
pub fn submit_vote<S: KvStore + ?Sized>(store: &mut S, msg: &MsgAddFinalitySig) -> FinalityResult<VoteOutcome> {
    verify_finality_vote(store, msg)?;

    let vote = FinalityVote {
        app_hash: msg.app_hash,
        pub_rand: msg.pub_rand,
        sig: msg.sig,
    };

    match vote_state(store, &msg.fp_pk, msg.height)? {
        VoteState::NoVote => {
            store.put_typed(vote_key(&msg.fp_pk, msg.height).as_bytes(), &vote)?;
            debug!(fp_pk = %msg.fp_pk, height = msg.height, app_hash = %msg.app_hash, "recorded finality vote");

            Ok(VoteOutcome::Accepted)
        }
        VoteState::Voted(recorded) if recorded.app_hash == vote.app_hash => Ok(VoteOutcome::Duplicate),
        VoteState::Voted(recorded) => {
            let (evidence, sk) = detect_and_extract(
                &msg.fp_pk,
                msg.height,
                &recorded.pub_rand,
                (&recorded.app_hash, &recorded.sig),
                (&vote.app_hash, &vote.sig),
            )?;

            record_evidence(store, &evidence)?;
            info!(fp_pk = %msg.fp_pk, height = msg.height, "detected double vote");

            Ok(VoteOutcome::Conflicting(Box::new(evidence), sk))
        }
    }
}

/// Returns the provider's vote state at `height`.
pub fn vote_state<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
    height: BlockHeight,
) -> FinalityResult<VoteState> {
    Ok(store
        .get_typed::<FinalityVote>(vote_key(fp_pk, height).as_bytes())?
        .map_or(VoteState::NoVote, VoteState::Voted))
}

/// Returns every vote recorded at `height`, by provider.
pub fn votes_at<S: KvStore + ?Sized>(
    store: &S,
    height: BlockHeight,
) -> FinalityResult<BTreeMap<XOnlyPublicKey, FinalityVote>> {
    let prefix = Key::new(prefix::FINALITY_VOTE).push_u64(height);
    let offset = prefix.as_bytes().len();

    Ok(store
        .iterate_typed::<FinalityVote>(prefix.as_bytes())?
        .into_iter()
        .filter_map(|(key, vote)| {
            let fp_pk = XOnlyPublicKey::from_slice(key.get(offset..)?).ok()?;

            Some((fp_pk, vote))
        })
        .collect())
}

fn vote_key(fp_pk: &XOnlyPublicKey, height: BlockHeight) -> Key {
    Key::new(prefix::FINALITY_VOTE)
        .push_u64(height)
        .push(fp_pk.serialize())
}
