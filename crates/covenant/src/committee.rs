//! The covenant committee.

use std::collections::BTreeSet;

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::errors::{CovenantError, CovenantResult};

/// An ordered set of covenant keys and the number of them that must sign.
///
/// Delegations keep their own copy of the committee, so a parameter change never affects an
/// existing delegation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CovenantCommittee {
    /// Members sorted by their serialized key.
    members: Vec<XOnlyPublicKey>,
    quorum: u32,
}

impl CovenantCommittee {
    /// Creates a committee, sorting its members.
    ///
    /// # Errors
    ///
    /// If the committee is empty, has duplicate members, or the quorum is not in `1..=len`.
    pub fn new(members: Vec<XOnlyPublicKey>, quorum: u32) -> CovenantResult<Self> {
        if members.is_empty() {
            return Err(CovenantError::EmptyCommittee);
        }

        let mut seen = BTreeSet::new();
        if let Some(dup) = members.iter().find(|pk| !seen.insert((**pk).serialize())) {
            return Err(CovenantError::DuplicateMember(*dup));
        }

        if quorum == 0 || quorum as usize > members.len() {
            return Err(CovenantError::InvalidQuorum {
                quorum,
                size: members.len(),
            });
        }

        let mut members = members;
        members.sort_by_key(|pk| pk.serialize());

        Ok(Self { members, quorum })
    }

    /// Returns the members in sorted order.
    pub fn members(&self) -> &[XOnlyPublicKey] {
        &self.members
    }

    /// Returns the quorum.
    pub const fn quorum(&self) -> u32 {
        self.quorum
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the committee has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if `pk` is a member.
    pub fn contains(&self, pk: &XOnlyPublicKey) -> bool {
        self.members
            .binary_search_by_key(&pk.serialize(), |member| member.serialize())
            .is_ok()
    }
}
