//! Begin- and end-of-block processing.

use btc_staking_db::KvStore;
use btc_staking_epoching::epoch;
use btc_staking_finality::{liveness, tally, vote, VoteState};
use btc_staking_primitives::types::{AppHash, BlockHeight};
use btc_staking_voting_power::power_table_at;
use tracing::{debug, error, warn};

use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    store,
};

/// Advances the epoch if the block opens a new one and indexes the block for finality.
pub(crate) fn begin_block<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    app_hash: AppHash,
) -> StakingResult<()> {
    ensure_sequential(ctx.store, ctx.height)?;

    if let Some(epoch) = epoch::on_block_start(ctx.store, ctx.height)? {
        ctx.emit(StakingEvent::EpochAdvanced(epoch));
        ctx.refresh_power()?;
    }

    tally::index_block(ctx.store, ctx.height, app_hash)?;

    Ok(())
}

/// Jails providers that stopped voting and finalizes every block that has gathered a quorum.
pub(crate) fn end_block<S: KvStore + ?Sized>(ctx: &mut BlockCtx<'_, S>) -> StakingResult<()> {
    check_liveness(ctx)?;

    let finalized = tally::tally_blocks(ctx.store, ctx.height, |store, height| {
        Ok(power_table_at(store, height)?.into_inner())
    })?;

    for block in finalized {
        ctx.emit(StakingEvent::BlockFinalized {
            height: block.height,
            app_hash: block.app_hash,
        });
    }

    Ok(())
}

fn ensure_sequential<S: KvStore + ?Sized>(store: &S, height: BlockHeight) -> StakingResult<()> {
    if tally::next_height_to_finalize(store)?.is_none() {
        // first block
        return Ok(());
    }

    let follows_last = match height.checked_sub(1) {
        Some(prev) => tally::indexed_block(store, prev)?.is_some(),
        None => false,
    };

    if !follows_last || tally::indexed_block(store, height)?.is_some() {
        warn!(%height, "rejecting out of order block");
        return Err(StakingError::NonSequentialHeight(height));
    }

    Ok(())
}

/// Records who voted at the height whose voting window just closed and jails the providers that
/// missed too many votes.
fn check_liveness<S: KvStore + ?Sized>(ctx: &mut BlockCtx<'_, S>) -> StakingResult<()> {
    let params = ctx.params;
    let finality_params = &params.finality;
    let Some(height) = ctx.height.checked_sub(finality_params.finality_sig_timeout) else {
        return Ok(());
    };

    if tally::indexed_block(ctx.store, height)?.is_none() {
        return Ok(());
    }

    let power_table = power_table_at(ctx.store, height)?;
    let mut jailed_any = false;

    for (fp_pk, power) in power_table.iter() {
        if *power == 0 {
            continue;
        }

        let mut provider = store::provider(ctx.store, fp_pk)?.ok_or_else(|| {
            error!(%fp_pk, %height, "power table references an unknown provider");
            StakingError::Fatal(format!("unknown provider {fp_pk} in power table"))
        })?;

        if !provider.is_eligible() {
            continue;
        }

        let voted = !matches!(vote::vote_state(ctx.store, fp_pk, height)?, VoteState::NoVote);
        if !liveness::handle_liveness(ctx.store, finality_params, fp_pk, height, voted)? {
            continue;
        }

        let jailed_until = liveness::jail(ctx.store, finality_params, fp_pk, ctx.time)?;
        provider.jailed = true;
        provider.jailed_until = Some(jailed_until);
        store::put_provider(ctx.store, &provider)?;

        ctx.emit(StakingEvent::FinalityProviderJailed {
            fp_pk: *fp_pk,
            jailed_until,
        });
        jailed_any = true;
    }

    if jailed_any {
        debug!(height = ctx.height, "jailed providers, refreshing voting power");
        ctx.refresh_power()?;
    }

    Ok(())
}
