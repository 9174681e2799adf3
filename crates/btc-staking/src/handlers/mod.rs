//! Message handlers.
//!
//! Every handler validates its message completely before it writes anything it cannot take back;
//! the caller discards the writes of a rejected message in any case.

mod covenant;
mod delegation;
mod finality;
mod headers;
mod provider;

use btc_staking_db::KvStore;
use secp256k1::XOnlyPublicKey;

use crate::{
    context::BlockCtx,
    errors::{StakingError, StakingResult},
    msgs::Msg,
    store,
    types::FinalityProvider,
};

/// Routes `msg` to its handler.
pub(crate) fn handle<S: KvStore + ?Sized>(ctx: &mut BlockCtx<'_, S>, msg: Msg) -> StakingResult<()> {
    match msg {
        Msg::CreateFinalityProvider(msg) => provider::create_finality_provider(ctx, msg),
        Msg::UnjailFinalityProvider(msg) => provider::unjail_finality_provider(ctx, msg),
        Msg::CreateBtcDelegation(msg) => delegation::create_btc_delegation(ctx, *msg),
        Msg::BtcUndelegate(msg) => delegation::btc_undelegate(ctx, msg),
        Msg::ReportSlashingTx(msg) => delegation::report_slashing_tx(ctx, *msg),
        Msg::AddCovenantSigs(msg) => covenant::add_covenant_sigs(ctx, *msg),
        Msg::CommitPubRand(msg) => finality::commit_pub_rand(ctx, msg),
        Msg::AddFinalitySig(msg) => finality::add_finality_sig(ctx, msg),
        Msg::InsertHeaders(msg) => headers::insert_headers(ctx, msg),
    }
}

/// Loads a provider that must exist and must not be slashed.
fn live_provider<S: KvStore + ?Sized>(
    store: &S,
    fp_pk: &XOnlyPublicKey,
) -> StakingResult<FinalityProvider> {
    let provider = store::provider(store, fp_pk)?.ok_or(StakingError::UnknownProvider(*fp_pk))?;

    if provider.is_slashed() {
        return Err(StakingError::ProviderSlashed(*fp_pk));
    }

    Ok(provider)
}
