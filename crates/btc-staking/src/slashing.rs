//! Slashing of finality providers and their delegations.

use bitcoin::Transaction;
use btc_staking_db::KvStore;
use btc_staking_primitives::secp::EvenSecretKey;
use tracing::{debug, error, info, warn};

use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    store,
    types::{BtcDelegation, DelegationState},
};

/// Slashes the provider whose key is `fp_sk` along with every delegation that is not yet final.
///
/// The provider's power is gone from the current height on. Slashing a provider twice is a
/// no-op.
pub(crate) fn slash_provider<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    fp_sk: &EvenSecretKey,
) -> StakingResult<()> {
    let fp_pk = fp_sk.x_only_public_key();
    let mut provider =
        store::provider(ctx.store, &fp_pk)?.ok_or(StakingError::UnknownProvider(fp_pk))?;

    if provider.is_slashed() {
        debug!(%fp_pk, "finality provider is already slashed");
        return Ok(());
    }

    provider.slashed_height = Some(ctx.height);
    store::put_provider(ctx.store, &provider)?;

    info!(%fp_pk, height = ctx.height, "slashing finality provider");
    ctx.emit(StakingEvent::FinalityProviderSlashed {
        fp_pk,
        height: ctx.height,
    });

    for staking_txid in store::delegation_ids_by_provider(ctx.store, &fp_pk)? {
        let mut delegation = store::delegation(ctx.store, &staking_txid)?.ok_or_else(|| {
            error!(%staking_txid, %fp_pk, "provider index points at a missing delegation");
            StakingError::Fatal(format!("missing delegation {staking_txid}"))
        })?;

        if delegation.state.is_terminal() {
            continue;
        }

        let (slashing_tx, unbonding_slashing_tx) = complete_slashing_txs(&delegation, fp_sk);

        delegation.state = DelegationState::Slashed;
        store::put_delegation(ctx.store, &delegation)?;

        info!(%staking_txid, %fp_pk, "slashed delegation");
        ctx.emit(StakingEvent::DelegationSlashed {
            staking_txid,
            fp_pk,
            slashing_tx,
            unbonding_slashing_tx,
        });
    }

    ctx.refresh_power()?;

    Ok(())
}

/// Signs both slashing txs of `delegation` as the provider and completes the covenant signatures
/// with its key.
///
/// A tx is left out if the covenant signatures cannot complete it, e.g. if the delegation never
/// reached a quorum.
fn complete_slashing_txs(
    delegation: &BtcDelegation,
    fp_sk: &EvenSecretKey,
) -> (Option<Transaction>, Option<Transaction>) {
    let fp_pk = fp_sk.x_only_public_key();
    let staking_txid = delegation.staking_txid();

    let slashing_tx = delegation
        .slashing()
        .and_then(|slashing| {
            Ok(slashing.finalize_with_provider_key(
                delegation.delegator_slashing_sig,
                fp_sk,
                &delegation.adaptor_sigs_for(&fp_pk, false),
            )?)
        })
        .inspect_err(|e| warn!(%staking_txid, %e, "could not complete slashing tx"))
        .ok();

    let unbonding_slashing_tx = delegation
        .unbonding_slashing()
        .and_then(|slashing| {
            Ok(slashing.finalize_with_provider_key(
                delegation.undelegation.delegator_slashing_sig,
                fp_sk,
                &delegation.adaptor_sigs_for(&fp_pk, true),
            )?)
        })
        .inspect_err(|e| warn!(%staking_txid, %e, "could not complete unbonding slashing tx"))
        .ok();

    (slashing_tx, unbonding_slashing_tx)
}
