//! Creation, unbonding, activation and reported slashing of BTC delegations.

use std::collections::BTreeMap;

use bitcoin::{OutPoint, Transaction, Txid};
use btc_staking_covenant::CovenantCommittee;
use btc_staking_db::KvStore;
use btc_staking_light_client::{BtcHeaderInfo, TxInclusionProof};
use btc_staking_tx_graph::{
    connectors::prelude::StakingConnector,
    errors::TxGraphError,
    keys::StakingKeys,
    transactions::prelude::{verify_staking_tx, SlashingTx, UnbondingTx},
};
use tracing::{debug, info, warn};

use super::live_provider;
use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    msgs::{MsgBtcUndelegate, MsgCreateBtcDelegation, MsgReportSlashingTx},
    slashing::slash_provider,
    store,
    types::{BtcDelegation, BtcUndelegation, DelegationState},
};

pub(super) fn create_btc_delegation<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgCreateBtcDelegation,
) -> StakingResult<()> {
    let params = &ctx.params.staking;
    let staking_txid = msg.staking_tx.compute_txid();

    if !msg.pop.verify(&msg.staker_pk, &msg.staker_addr) {
        warn!(%staking_txid, staker_pk = %msg.staker_pk, "rejecting delegation with invalid proof of possession");
        return Err(StakingError::InvalidPop(msg.staker_pk));
    }

    if let Some(existing) = store::delegation(ctx.store, &staking_txid)? {
        return reanchor_delegation(ctx, existing, &msg.inclusion_proof);
    }

    if !(params.min_staking_value..=params.max_staking_value).contains(&msg.staking_value) {
        return Err(StakingError::StakingValueOutOfRange {
            value: msg.staking_value,
            min: params.min_staking_value,
            max: params.max_staking_value,
        });
    }

    if !(params.min_staking_time..=params.max_staking_time).contains(&msg.staking_time) {
        return Err(StakingError::StakingTimeOutOfRange {
            time: msg.staking_time,
            min: params.min_staking_time,
            max: params.max_staking_time,
        });
    }

    for fp_pk in &msg.fp_pks {
        live_provider(ctx.store, fp_pk)?;
    }

    let committee = CovenantCommittee::new(params.covenant_pks.clone(), params.covenant_quorum)?;
    let keys = StakingKeys::new(msg.staker_pk, msg.fp_pks, committee)?;
    let fp_pks = keys.fp_pks().to_vec();
    let connector = StakingConnector::new(params.network, keys, msg.staking_time, msg.staking_value);

    verify_staking_tx(&msg.staking_tx, msg.staking_output_index, &connector)?;

    let inclusion = locate_tx(ctx, &msg.staking_tx, &msg.inclusion_proof)?;
    let start_height = inclusion.height();
    let end_height = start_height + u64::from(msg.staking_time);

    let tip = ctx.light_client.tip(&*ctx.store)?;
    if tip.height() >= end_height {
        return Err(StakingError::InvalidDelegationState {
            staking_txid,
            state: DelegationState::Expired,
        });
    }

    let staking_outpoint = OutPoint {
        txid: staking_txid,
        vout: msg.staking_output_index,
    };

    let slashing = SlashingTx::from_tx(msg.slashing_tx, &connector, staking_outpoint, params)?;
    slashing.verify_signature(&msg.staker_pk, &msg.delegator_slashing_sig)?;

    let unbonding = UnbondingTx::from_tx(msg.unbonding_tx, &connector, staking_outpoint, params)?;
    let unbonding_slashing = SlashingTx::from_tx(
        msg.unbonding_slashing_tx,
        unbonding.connector(),
        unbonding.unbonding_outpoint(),
        params,
    )?;
    unbonding_slashing.verify_signature(&msg.staker_pk, &msg.delegator_unbonding_slashing_sig)?;

    let delegation = BtcDelegation {
        staker_addr: msg.staker_addr,
        staker_pk: msg.staker_pk,
        fp_pks,
        staking_tx: msg.staking_tx,
        staking_output_index: msg.staking_output_index,
        staking_time: msg.staking_time,
        total_sat: msg.staking_value,
        inclusion_block: inclusion.hash(),
        start_height,
        end_height,
        slashing_tx: slashing.tx().clone(),
        delegator_slashing_sig: msg.delegator_slashing_sig,
        covenant_sigs: BTreeMap::new(),
        params: params.clone(),
        undelegation: BtcUndelegation {
            unbonding_tx: unbonding.tx().clone(),
            unbonding_time: params.unbonding_time,
            slashing_tx: unbonding_slashing.tx().clone(),
            delegator_slashing_sig: msg.delegator_unbonding_slashing_sig,
            delegator_unbonding_sig: None,
        },
        state: DelegationState::Pending,
    };
    store::put_delegation(ctx.store, &delegation)?;

    info!(%staking_txid, staker = %delegation.staker_pk, value = %delegation.total_sat, %start_height, %end_height, "created delegation");
    ctx.emit(StakingEvent::DelegationCreated { staking_txid });

    Ok(())
}

/// Moves a pending delegation to the canonical block that includes its staking tx now.
///
/// Only a delegation whose inclusion block left the canonical chain can be re-anchored; any
/// other resubmission is a duplicate. The covenant signatures stay valid since none of the
/// pre-signed txs commit to the inclusion block.
fn reanchor_delegation<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    mut delegation: BtcDelegation,
    inclusion_proof: &TxInclusionProof,
) -> StakingResult<()> {
    let staking_txid = delegation.staking_txid();

    let anchored = ctx
        .light_client
        .main_chain_depth(&*ctx.store, &delegation.inclusion_block)?
        .is_some();
    if delegation.state != DelegationState::Pending || anchored {
        return Err(StakingError::DuplicateDelegation(staking_txid));
    }

    let inclusion = locate_tx(ctx, &delegation.staking_tx, inclusion_proof)?;
    let start_height = inclusion.height();
    let end_height = start_height + u64::from(delegation.staking_time);

    let tip = ctx.light_client.tip(&*ctx.store)?;
    if tip.height() >= end_height {
        return Err(StakingError::InvalidDelegationState {
            staking_txid,
            state: DelegationState::Expired,
        });
    }

    let orphaned = delegation.inclusion_block;
    store::unindex_inclusion_block(ctx.store, &delegation)?;
    delegation.inclusion_block = inclusion.hash();
    delegation.start_height = start_height;
    delegation.end_height = end_height;

    info!(%staking_txid, %orphaned, inclusion_block = %inclusion.hash(), %start_height, %end_height, "re-anchored delegation");
    ctx.emit(StakingEvent::DelegationInclusionUpdated {
        staking_txid,
        inclusion_block: inclusion.hash(),
    });

    let activated = try_activate(ctx, &mut delegation)?;
    store::put_delegation(ctx.store, &delegation)?;

    if activated {
        ctx.refresh_power()?;
    }

    Ok(())
}

pub(super) fn btc_undelegate<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgBtcUndelegate,
) -> StakingResult<()> {
    let staking_txid = msg.staking_txid;
    let mut delegation = load_delegation(ctx.store, &staking_txid)?;

    let was_active = match delegation.state {
        DelegationState::Active => true,
        DelegationState::Pending => false,
        state => return Err(StakingError::InvalidDelegationState { staking_txid, state }),
    };

    let unbonding = delegation.unbonding()?;
    unbonding.verify_signature(&delegation.staker_pk, &msg.unbonding_sig)?;

    // signatures were verified when they were added
    let covenant_sigs = delegation
        .covenant_sigs
        .iter()
        .map(|(member, sigs)| (*member, sigs.unbonding))
        .collect::<BTreeMap<_, _>>();

    let quorum = delegation.params.covenant_quorum;
    if covenant_sigs.len() < quorum as usize {
        debug!(%staking_txid, have = covenant_sigs.len(), %quorum, "not enough covenant unbonding signatures");
        return Err(StakingError::InsufficientQuorum {
            have: covenant_sigs.len(),
            need: quorum,
        });
    }

    let unbonding_tx = unbonding.finalize(msg.unbonding_sig, &covenant_sigs)?;

    delegation.undelegation.delegator_unbonding_sig = Some(msg.unbonding_sig);
    delegation.state = DelegationState::Unbonded;
    store::put_delegation(ctx.store, &delegation)?;

    info!(%staking_txid, unbonding_txid = %unbonding_tx.compute_txid(), "unbonded delegation");
    ctx.emit(StakingEvent::DelegationUnbonded {
        staking_txid,
        unbonding_tx,
    });

    if was_active {
        ctx.refresh_power()?;
    }

    Ok(())
}

pub(super) fn report_slashing_tx<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgReportSlashingTx,
) -> StakingResult<()> {
    let staking_txid = msg.staking_txid;
    let delegation = load_delegation(ctx.store, &staking_txid)?;

    if delegation.state == DelegationState::Slashed {
        return Err(StakingError::InvalidDelegationState {
            staking_txid,
            state: delegation.state,
        });
    }

    let txid = msg.slashing_tx.compute_txid();
    let inclusion = locate_tx(ctx, &msg.slashing_tx, &msg.inclusion_proof)?;
    let confirmed = ctx.light_client.is_confirmed(
        &*ctx.store,
        &inclusion.hash(),
        delegation.params.confirmation_depth,
    )?;
    if !confirmed {
        return Err(StakingError::NotConfirmed {
            txid,
            block_hash: inclusion.hash(),
        });
    }

    let (slashing, unbonding) = if txid == delegation.slashing_tx.compute_txid() {
        (delegation.slashing()?, false)
    } else if txid == delegation.undelegation.slashing_tx.compute_txid() {
        (delegation.unbonding_slashing()?, true)
    } else {
        warn!(%staking_txid, %txid, "reported tx is not a slashing tx of the delegation");
        return Err(TxGraphError::TxMismatch.into());
    };

    let fp_sk = delegation
        .fp_pks
        .iter()
        .find_map(|fp_pk| {
            slashing
                .reveal_provider_key(&msg.slashing_tx, fp_pk, &delegation.adaptor_sigs_for(fp_pk, unbonding))
                .ok()
        })
        .ok_or_else(|| {
            TxGraphError::MalformedWitness("witness reveals no provider key".to_string())
        })?;

    info!(%staking_txid, %txid, fp_pk = %fp_sk.x_only_public_key(), "slashing tx was broadcast");

    slash_provider(ctx, &fp_sk)
}

/// Activates `delegation` if it is pending, unexpired, deep enough in the BTC chain and signed by
/// a covenant quorum.
///
/// The caller stores the delegation and refreshes the power table. Returns `true` if the
/// delegation was activated.
pub(super) fn try_activate<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    delegation: &mut BtcDelegation,
) -> StakingResult<bool> {
    if delegation.state != DelegationState::Pending {
        return Ok(false);
    }

    let tip = ctx.light_client.tip(&*ctx.store)?;
    if delegation.is_expired_at(tip.height()) {
        return Ok(false);
    }

    let confirmed = ctx.light_client.is_confirmed(
        &*ctx.store,
        &delegation.inclusion_block,
        delegation.params.confirmation_depth,
    )?;
    if !confirmed || !delegation.has_covenant_quorum()? {
        return Ok(false);
    }

    let staking_txid = delegation.staking_txid();
    delegation.state = DelegationState::Active;

    info!(%staking_txid, power = delegation.voting_power(), "activated delegation");
    ctx.emit(StakingEvent::DelegationActivated { staking_txid });

    Ok(true)
}

pub(super) fn load_delegation<S: KvStore + ?Sized>(
    store: &S,
    staking_txid: &Txid,
) -> StakingResult<BtcDelegation> {
    store::delegation(store, staking_txid)?.ok_or(StakingError::UnknownDelegation(*staking_txid))
}

/// Returns the canonical header that `proof` places `tx` in.
fn locate_tx<S: KvStore + ?Sized>(
    ctx: &BlockCtx<'_, S>,
    tx: &Transaction,
    proof: &TxInclusionProof,
) -> StakingResult<BtcHeaderInfo> {
    let txid = tx.compute_txid();
    let header = ctx
        .light_client
        .header_by_hash(&*ctx.store, &proof.block_hash())?
        .ok_or(StakingError::InclusionProofInvalid(txid))?;

    if !ctx.light_client.is_canonical(&*ctx.store, &header)? || !proof.verify(tx, header.header()) {
        warn!(%txid, block_hash = %header.hash(), "inclusion proof does not verify");
        return Err(StakingError::InclusionProofInvalid(txid));
    }

    Ok(header)
}
