//! Recomputation of the voting power table.

use std::collections::BTreeMap;

use btc_staking_db::KvStore;
use btc_staking_primitives::types::BlockHeight;
use btc_staking_voting_power::{record_snapshot, PowerTable};
use tracing::debug;

use crate::{
    errors::StakingResult,
    store,
    types::{DelegationState, FinalityProvider},
};

/// Recomputes the power table from the current delegations and records it from `height` on.
///
/// Only active delegations count, and only towards providers that are neither jailed nor
/// slashed.
pub(crate) fn refresh_power_table<S: KvStore + ?Sized>(
    store: &mut S,
    height: BlockHeight,
) -> StakingResult<PowerTable> {
    let providers = store::providers(store)?
        .into_iter()
        .map(|provider| (provider.btc_pk, provider))
        .collect::<BTreeMap<_, _>>();

    let active = store::delegations_in(store, DelegationState::Active)?;

    let table = PowerTable::compute(
        active
            .iter()
            .map(|delegation| (delegation.fp_pks.as_slice(), delegation.voting_power())),
        |fp_pk| providers.get(fp_pk).is_some_and(FinalityProvider::is_eligible),
    );

    record_snapshot(store, height, &table)?;

    debug!(%height, providers = table.len(), total = table.total(), "refreshed voting power");

    Ok(table)
}
