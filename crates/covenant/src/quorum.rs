//! Quorum counting over covenant adaptor signatures.

use std::collections::BTreeSet;

use rayon::prelude::*;
use secp256k1::{Message, XOnlyPublicKey};
use tracing::debug;

use crate::{
    adaptor::{verify_adaptor_sig, AdaptorSignature},
    committee::CovenantCommittee,
};

/// Returns the committee members that have at least one valid signature in `sigs`.
///
/// Signatures from keys outside the committee are ignored. Verification runs in parallel; the
/// result is ordered by key.
pub fn valid_members(
    sigs: &[(XOnlyPublicKey, AdaptorSignature)],
    committee: &CovenantCommittee,
    sighash: &Message,
    encryption_key: &XOnlyPublicKey,
) -> BTreeSet<XOnlyPublicKey> {
    let valid = sigs
        .par_iter()
        .filter(|(member, _)| committee.contains(member))
        .filter(|(member, sig)| verify_adaptor_sig(member, sig, sighash, encryption_key))
        .map(|(member, _)| *member)
        .collect::<BTreeSet<_>>();

    debug!(
        num_sigs = sigs.len(),
        num_valid = valid.len(),
        quorum = committee.quorum(),
        "counted covenant signatures"
    );

    valid
}

/// Counts the distinct committee members with a valid signature in `sigs`.
pub fn count_valid_quorum(
    sigs: &[(XOnlyPublicKey, AdaptorSignature)],
    committee: &CovenantCommittee,
    sighash: &Message,
    encryption_key: &XOnlyPublicKey,
) -> usize {
    valid_members(sigs, committee, sighash, encryption_key).len()
}
