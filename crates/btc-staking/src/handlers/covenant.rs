//! Covenant signature submission.

use std::collections::{BTreeMap, BTreeSet};

use btc_staking_covenant::{verify_adaptor_sig, AdaptorSignature};
use btc_staking_db::KvStore;
use rayon::prelude::*;
use secp256k1::{Message, XOnlyPublicKey};
use tracing::{debug, info, warn};

use super::delegation::{load_delegation, try_activate};
use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    events::StakingEvent,
    msgs::MsgAddCovenantSigs,
    store,
    types::{CovenantAdaptorSigs, DelegationState},
};

/// Records one member's signatures for a delegation and activates it once it has a quorum.
///
/// A member signs once; later submissions by the same member are rejected even if they carry
/// different signatures.
pub(super) fn add_covenant_sigs<S: KvStore + ?Sized>(
    ctx: &mut BlockCtx<'_, S>,
    msg: MsgAddCovenantSigs,
) -> StakingResult<()> {
    let staking_txid = msg.staking_txid;
    let member = msg.covenant_pk;
    let mut delegation = load_delegation(ctx.store, &staking_txid)?;

    if !matches!(
        delegation.state,
        DelegationState::Pending | DelegationState::Active
    ) {
        return Err(StakingError::InvalidDelegationState {
            staking_txid,
            state: delegation.state,
        });
    }

    if !delegation.committee()?.contains(&member) {
        return Err(StakingError::NotCovenantMember(member));
    }

    if delegation.covenant_sigs.contains_key(&member) {
        return Err(StakingError::DuplicateCovenantSigs {
            staking_txid,
            member,
        });
    }

    let slashing = per_provider(&delegation.fp_pks, msg.slashing_sigs)?;
    let unbonding_slashing = per_provider(&delegation.fp_pks, msg.unbonding_slashing_sigs)?;

    verify_adaptor_sigs(&member, &slashing, &delegation.slashing()?.sighash()?)?;
    verify_adaptor_sigs(
        &member,
        &unbonding_slashing,
        &delegation.unbonding_slashing()?.sighash()?,
    )?;

    if delegation
        .unbonding()?
        .verify_signature(&member, &msg.unbonding_sig)
        .is_err()
    {
        warn!(%staking_txid, %member, "invalid covenant unbonding signature");
        return Err(StakingError::InvalidCovenantSig(member));
    }

    delegation.covenant_sigs.insert(
        member,
        CovenantAdaptorSigs {
            slashing,
            unbonding_slashing,
            unbonding: msg.unbonding_sig,
        },
    );

    debug!(%staking_txid, %member, num_members = delegation.covenant_sigs.len(), "added covenant signatures");
    ctx.emit(StakingEvent::CovenantSigsAdded {
        staking_txid,
        covenant_pk: member,
    });

    let activated = try_activate(ctx, &mut delegation)?;
    store::put_delegation(ctx.store, &delegation)?;

    if activated {
        info!(%staking_txid, "delegation reached covenant quorum");
        ctx.refresh_power()?;
    }

    Ok(())
}

/// Indexes `sigs` by provider, requiring exactly one signature for each of `fp_pks`.
fn per_provider(
    fp_pks: &[XOnlyPublicKey],
    sigs: Vec<(XOnlyPublicKey, AdaptorSignature)>,
) -> StakingResult<BTreeMap<XOnlyPublicKey, AdaptorSignature>> {
    let num_sigs = sigs.len();
    let by_provider = sigs.into_iter().collect::<BTreeMap<_, _>>();

    let expected = fp_pks.iter().collect::<BTreeSet<_>>();
    if by_provider.len() != num_sigs || !by_provider.keys().eq(expected.into_iter()) {
        return Err(StakingError::MalformedInput(format!(
            "expected one adaptor signature per provider, got {num_sigs} for {} providers",
            fp_pks.len()
        )));
    }

    Ok(by_provider)
}

fn verify_adaptor_sigs(
    member: &XOnlyPublicKey,
    sigs: &BTreeMap<XOnlyPublicKey, AdaptorSignature>,
    sighash: &Message,
) -> StakingResult<()> {
    let all_valid = sigs
        .par_iter()
        .all(|(fp_pk, sig)| verify_adaptor_sig(member, sig, sighash, fp_pk));

    if !all_valid {
        warn!(%member, "invalid covenant adaptor signature");
        return Err(StakingError::InvalidCovenantSig(*member));
    }

    Ok(())
}
