//! Merkle commitments over a list of public randomness.
//!
//! The tree pairs the last node of an odd level with itself, like bitcoin's txid tree, but
//! hashes leaves and inner nodes with distinct prefixes and binds the total leaf count into each
//! proof, so a proof for one list size never opens a commitment to another.

use btc_staking_eots::PubRand;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;
const ROOT_PREFIX: u8 = 0x02;

fn leaf_hash(pub_rand: &PubRand) -> [u8; 32] {
    Sha256::new()
        .chain_update([LEAF_PREFIX])
        .chain_update(pub_rand.as_bytes())
        .finalize()
        .into()
}

fn inner_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    Sha256::new()
        .chain_update([INNER_PREFIX])
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// Binds the list length into the tree root.
fn root_hash(total: u64, tree_root: &[u8; 32]) -> [u8; 32] {
    Sha256::new()
        .chain_update([ROOT_PREFIX])
        .chain_update(total.to_be_bytes())
        .chain_update(tree_root)
        .finalize()
        .into()
}

/// Number of levels above the leaves in a tree of `total` leaves.
fn depth(total: u64) -> usize {
    let mut depth = 0;
    let mut width = total;
    while width > 1 {
        width = width.div_ceil(2);
        depth += 1;
    }

    depth
}

/// Computes the root committing to `pub_rands`, or `None` if the list is empty.
pub fn compute_root(pub_rands: &[PubRand]) -> Option<[u8; 32]> {
    let leaves = pub_rands.iter().map(leaf_hash).collect::<Vec<_>>();

    walk(&leaves, 0).map(|(_, tree_root)| root_hash(pub_rands.len() as u64, &tree_root))
}

/// Builds the level-by-level siblings of `leaves[index]` and the root.
fn walk(leaves: &[[u8; 32]], index: usize) -> Option<(Vec<[u8; 32]>, [u8; 32])> {
    if index >= leaves.len() {
        return None;
    }

    let mut curr_level = leaves.to_vec();
    let mut curr_index = index;
    let mut aunts = vec![];
    while curr_level.len() > 1 {
        let next_level = curr_level
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);

                if i == curr_index / 2 {
                    aunts.push(if curr_index % 2 == 0 { right } else { left });
                }

                inner_hash(&left, &right)
            })
            .collect::<Vec<_>>();

        curr_index /= 2;
        curr_level = next_level;
    }

    Some((aunts, curr_level[0]))
}

/// Opening of one public randomness value against a commitment root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubRandProof {
    /// Position of the value in the committed list.
    pub index: u64,

    /// Length of the committed list.
    pub total: u64,

    /// Sibling hashes from the leaf up to the root.
    pub aunts: Vec<[u8; 32]>,
}

impl PubRandProof {
    /// Generates the proof for `pub_rands[index]`.
    pub fn generate(pub_rands: &[PubRand], index: u64) -> Option<Self> {
        let leaves = pub_rands.iter().map(leaf_hash).collect::<Vec<_>>();
        let (aunts, _root) = walk(&leaves, usize::try_from(index).ok()?)?;

        Some(Self {
            index,
            total: pub_rands.len() as u64,
            aunts,
        })
    }

    /// Returns `true` if `pub_rand` is at this proof's position in the list committed by `root`.
    pub fn verify(&self, root: &[u8; 32], pub_rand: &PubRand) -> bool {
        if self.index >= self.total || self.aunts.len() != depth(self.total) {
            return false;
        }

        let mut cur = leaf_hash(pub_rand);
        let mut pos = self.index;
        for aunt in &self.aunts {
            cur = if pos % 2 == 0 {
                inner_hash(&cur, aunt)
            } else {
                inner_hash(aunt, &cur)
            };
            pos /= 2;
        }

        &root_hash(self.total, &cur) == root
    }
}
