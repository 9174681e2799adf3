//! BTC header submission and its effect on delegations.

use btc_staking_db::KvStore;
use btc_staking_light_client::{BtcHeaderInfo, ChainEvent};
use tracing::{debug, info};

use super::delegation::try_activate;
use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    msgs::MsgInsertHeaders,
    store,
    types::DelegationState,
};

/// Inserts headers in order, then re-evaluates every live delegation against the new tip.
///
/// Delegations whose staking tx was rolled back lose their power until it is deep enough again.
pub(super) fn insert_headers<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgInsertHeaders,
) -> StakingResult<()> {
    if msg.headers.is_empty() {
        return Err(StakingError::MalformedInput("no headers".to_string()));
    }

    let mut power_changed = false;

    for header in msg.headers {
        for event in ctx.light_client.insert_header(ctx.store, header)? {
            match event {
                ChainEvent::RollBack(info) => {
                    ctx.emit(StakingEvent::RollBack(info.clone()));
                    power_changed |= deactivate_included_in(ctx, &info)?;
                }
                ChainEvent::RollForward(info) => {
                    ctx.emit(StakingEvent::RollForward(info));
                }
            }
        }
    }

    power_changed |= update_for_tip(ctx)?;

    if power_changed {
        ctx.refresh_power()?;
    }

    Ok(())
}

/// Moves the active delegations included in a rolled back block back to pending.
fn deactivate_included_in<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    info: &BtcHeaderInfo,
) -> StakingResult<bool> {
    let mut deactivated = false;

    for staking_txid in store::delegation_ids_by_block(ctx.store, &info.hash())? {
        let Some(mut delegation) = store::delegation(ctx.store, &staking_txid)? else {
            continue;
        };

        if delegation.state != DelegationState::Active {
            continue;
        }

        delegation.state = DelegationState::Pending;
        store::put_delegation(ctx.store, &delegation)?;

        info!(%staking_txid, block_hash = %info.hash(), "staking tx was rolled back, deactivating delegation");
        ctx.emit(StakingEvent::DelegationDeactivated { staking_txid });
        deactivated = true;
    }

    Ok(deactivated)
}

/// Expires delegations whose timelock elapsed and activates pending ones that became deep
/// enough.
///
/// Unbonded delegations stay slashable through their pre-signed txs until the staking timelock
/// elapses, so they expire like the others.
fn update_for_tip<S: KvStore + ?Sized>(ctx: &mut BlockCtx<'_, S>) -> StakingResult<bool> {
    let tip = ctx.light_client.tip(&*ctx.store)?;
    let mut changed = false;

    for state in [
        DelegationState::Pending,
        DelegationState::Active,
        DelegationState::Unbonded,
    ] {
        for mut delegation in store::delegations_in(ctx.store, state)? {
            let staking_txid = delegation.staking_txid();

            if delegation.is_expired_at(tip.height()) {
                changed |= state == DelegationState::Active;
                delegation.state = DelegationState::Expired;
                store::put_delegation(ctx.store, &delegation)?;

                debug!(%staking_txid, %state, tip = tip.height(), end_height = delegation.end_height, "delegation expired");
                ctx.emit(StakingEvent::DelegationExpired { staking_txid });
            } else if state == DelegationState::Pending && try_activate(ctx, &mut delegation)? {
                store::put_delegation(ctx.store, &delegation)?;
                changed = true;
            }
        }
    }

    Ok(changed)
}
