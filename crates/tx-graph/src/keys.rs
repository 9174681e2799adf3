//! The keys that lock a staking output.

use std::collections::BTreeSet;

use btc_staking_covenant::CovenantCommittee;
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::errors::{TxGraphError, TxGraphResult};

/// The staker, finality provider and covenant keys of a delegation.
///
/// Provider keys are kept sorted so that scripts are independent of submission order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StakingKeys {
    staker_pk: XOnlyPublicKey,
    fp_pks: Vec<XOnlyPublicKey>,
    covenant: CovenantCommittee,
}

impl StakingKeys {
    /// Creates the key set of a delegation.
    ///
    /// # Errors
    ///
    /// If there is no provider key or if any key is repeated among the staker, the providers and
    /// the committee.
    pub fn new(
        staker_pk: XOnlyPublicKey,
        fp_pks: Vec<XOnlyPublicKey>,
        covenant: CovenantCommittee,
    ) -> TxGraphResult<Self> {
        if fp_pks.is_empty() {
            return Err(TxGraphError::NoFinalityProviders);
        }

        let mut seen = BTreeSet::new();
        let all_keys = std::iter::once(&staker_pk)
            .chain(fp_pks.iter())
            .chain(covenant.members().iter());
        for pk in all_keys {
            if !seen.insert(*pk) {
                return Err(TxGraphError::DuplicateKey(*pk));
            }
        }

        let mut fp_pks = fp_pks;
        fp_pks.sort_by_key(|pk| pk.serialize());

        Ok(Self {
            staker_pk,
            fp_pks,
            covenant,
        })
    }

    /// Returns the staker's key.
    pub const fn staker_pk(&self) -> &XOnlyPublicKey {
        &self.staker_pk
    }

    /// Returns the finality provider keys, sorted.
    pub fn fp_pks(&self) -> &[XOnlyPublicKey] {
        &self.fp_pks
    }

    /// Returns the covenant committee.
    pub const fn covenant(&self) -> &CovenantCommittee {
        &self.covenant
    }
}
