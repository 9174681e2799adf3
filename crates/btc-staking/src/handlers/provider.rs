//! Registration and unjailing of finality providers.

use btc_staking_db::KvStore;
use btc_staking_finality::liveness;
use tracing::{info, warn};

use super::live_provider;
use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    msgs::{MsgCreateFinalityProvider, MsgUnjailFinalityProvider},
    store,
    types::FinalityProvider,
};

pub(super) fn create_finality_provider<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgCreateFinalityProvider,
) -> StakingResult<()> {
    let fp_pk = msg.btc_pk;

    if !msg.pop.verify(&fp_pk, &msg.addr) {
        warn!(%fp_pk, addr = %msg.addr, "rejecting provider with invalid proof of possession");
        return Err(StakingError::InvalidPop(fp_pk));
    }

    if store::provider(ctx.store, &fp_pk)?.is_some() {
        return Err(StakingError::DuplicateProvider(fp_pk));
    }

    let provider = FinalityProvider {
        btc_pk: fp_pk,
        addr: msg.addr,
        commission: msg.commission,
        registered_height: ctx.height,
        jailed: false,
        jailed_until: None,
        slashed_height: None,
    };
    store::put_provider(ctx.store, &provider)?;

    info!(%fp_pk, addr = %provider.addr, "registered finality provider");
    ctx.emit(StakingEvent::FinalityProviderCreated { fp_pk });

    Ok(())
}

pub(super) fn unjail_finality_provider<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgUnjailFinalityProvider,
) -> StakingResult<()> {
    let fp_pk = msg.fp_pk;
    let mut provider = live_provider(ctx.store, &fp_pk)?;

    liveness::unjail(ctx.store, &fp_pk, ctx.height, ctx.time)?;

    provider.jailed = false;
    provider.jailed_until = None;
    store::put_provider(ctx.store, &provider)?;

    info!(%fp_pk, height = ctx.height, "unjailed finality provider");
    ctx.emit(StakingEvent::FinalityProviderUnjailed { fp_pk });
    ctx.refresh_power()?;

    Ok(())
}
