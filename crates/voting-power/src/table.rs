//! The voting power table.

use std::collections::BTreeMap;

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

/// Voting power per finality provider, in satoshis.
///
/// Providers without power are never present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerTable(BTreeMap<XOnlyPublicKey, u64>);

impl PowerTable {
    /// Computes the table from the active delegations.
    ///
    /// Every delegation contributes its full value to each of its providers. Providers for which
    /// `is_eligible` returns `false`, e.g. jailed or slashed ones, get no power.
    pub fn compute<'a, D, F>(delegations: D, is_eligible: F) -> Self
    where
        D: IntoIterator<Item = (&'a [XOnlyPublicKey], u64)>,
        F: Fn(&XOnlyPublicKey) -> bool,
    {
        let mut powers = BTreeMap::new();
        for (fp_pks, value) in delegations {
            for fp_pk in fp_pks.iter().filter(|fp_pk| is_eligible(fp_pk)) {
                let power: &mut u64 = powers.entry(*fp_pk).or_default();
                *power = power.saturating_add(value);
            }
        }

        Self::from_iter(powers)
    }

    /// Returns the power of `fp_pk`.
    pub fn power_of(&self, fp_pk: &XOnlyPublicKey) -> u64 {
        self.0.get(fp_pk).copied().unwrap_or_default()
    }

    /// Returns the sum of all powers.
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |total, power| total.saturating_add(*power))
    }

    /// Returns the number of providers with power.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no provider has power.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over providers and their power in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&XOnlyPublicKey, &u64)> {
        self.0.iter()
    }

    /// Returns the underlying map.
    pub fn into_inner(self) -> BTreeMap<XOnlyPublicKey, u64> {
        self.0
    }
}

impl FromIterator<(XOnlyPublicKey, u64)> for PowerTable {
    fn from_iter<T: IntoIterator<Item = (XOnlyPublicKey, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().filter(|(_, power)| *power > 0).collect())
    }
}
