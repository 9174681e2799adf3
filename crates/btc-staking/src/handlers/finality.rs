//! Randomness commitments and finality votes.

use btc_staking_db::KvStore;
use btc_staking_finality::{commitment, tally, vote, MsgAddFinalitySig, MsgCommitPubRand, VoteOutcome};
use btc_staking_voting_power::voting_power;
use tracing::{debug, warn};

use super::live_provider;
use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    slashing::slash_provider,
};

pub(super) fn commit_pub_rand<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgCommitPubRand,
) -> StakingResult<()> {
    let commit = &msg.commit;
    live_provider(ctx.store, &commit.fp_pk)?;

    commitment::commit_pub_rand(ctx.store, &ctx.params.finality, &msg)?;

    ctx.emit(StakingEvent::PubRandCommitted {
        fp_pk: commit.fp_pk,
        start_height: commit.start_height,
        num_pub_rand: commit.num_pub_rand,
    });

    Ok(())
}

/// Records a finality vote.
///
/// A vote that conflicts with an earlier vote of the same provider is accepted as evidence: the
/// provider's key is extracted from the pair and the provider is slashed on the spot.
pub(super) fn add_finality_sig<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgAddFinalitySig,
) -> StakingResult<()> {
    let (fp_pk, height) = (msg.fp_pk, msg.height);
    live_provider(ctx.store, &fp_pk)?;

    if tally::indexed_block(ctx.store, height)?.is_none() {
        return Err(StakingError::BlockNotIndexed(height));
    }

    if voting_power(ctx.store, &fp_pk, height)? == 0 {
        debug!(%fp_pk, %height, "rejecting vote without voting power");
        return Err(StakingError::NoVotingPower { fp_pk, height });
    }

    match vote::submit_vote(ctx.store, &msg)? {
        VoteOutcome::Accepted => {
            ctx.emit(StakingEvent::FinalityVoteAdded {
                fp_pk,
                height,
                app_hash: msg.app_hash,
            });
        }
        VoteOutcome::Duplicate => {
            debug!(%fp_pk, %height, "ignoring duplicate vote");
        }
        VoteOutcome::Conflicting(evidence, fp_sk) => {
            warn!(%fp_pk, %height, voted = %evidence.voted_app_hash, conflicting = %evidence.conflicting_app_hash, "provider equivocated");
            ctx.emit(StakingEvent::EvidenceDetected(evidence));
            slash_provider(ctx, &fp_sk)?;
        }
    }

    Ok(())
}
