//! Merkle inclusion proofs of transactions in bitcoin blocks.

use bitcoin::{
    block::Header,
    hashes::{sha256d, Hash},
    BlockHash, Transaction, TxMerkleNode,
};
use serde::{Deserialize, Serialize};

/// Proof that a transaction is part of the txid merkle tree of a specific block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInclusionProof {
    /// The block the transaction is included in.
    block_hash: BlockHash,

    /// The 0-based position of the transaction within the block.
    position: u32,

    /// The sibling hashes along the path from the transaction to the root.
    cohashes: Vec<[u8; 32]>,
}

impl TxInclusionProof {
    /// Creates a new inclusion proof.
    pub const fn new(block_hash: BlockHash, position: u32, cohashes: Vec<[u8; 32]>) -> Self {
        Self {
            block_hash,
            position,
            cohashes,
        }
    }

    /// Generates the proof for the transaction at `position` in `transactions`.
    ///
    /// Returns `None` if `position` is out of bounds.
    pub fn generate(block_hash: BlockHash, transactions: &[Transaction], position: u32) -> Option<Self> {
        let txids = transactions
            .iter()
            .map(|tx| tx.compute_txid().to_byte_array())
            .collect::<Vec<_>>();
        let (cohashes, _root) = get_cohashes(&txids, position)?;

        Some(Self::new(block_hash, position, cohashes))
    }

    /// Returns the hash of the block the proof is for.
    pub const fn block_hash(&self) -> BlockHash {
        self.block_hash
    }

    /// Returns the position of the transaction in the block.
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Computes the merkle root implied by this proof for `transaction`.
    pub fn compute_root(&self, transaction: &Transaction) -> TxMerkleNode {
        let mut cur_hash = transaction.compute_txid().to_byte_array();

        let mut pos = self.position;
        for cohash in &self.cohashes {
            let mut buf = [0u8; 64];
            if pos & 1 == 0 {
                buf[0..32].copy_from_slice(&cur_hash);
                buf[32..64].copy_from_slice(cohash);
            } else {
                buf[0..32].copy_from_slice(cohash);
                buf[32..64].copy_from_slice(&cur_hash);
            }
            cur_hash = sha256d::Hash::hash(&buf).to_byte_array();
            pos >>= 1;
        }

        TxMerkleNode::from_byte_array(cur_hash)
    }

    /// Verifies that `transaction` is included in `header`.
    pub fn verify(&self, transaction: &Transaction, header: &Header) -> bool {
        header.block_hash() == self.block_hash && self.compute_root(transaction) == header.merkle_root
    }
}

/// Computes the cohashes proving that `ids[index]` is part of the merkle tree over `ids`.
///
/// Levels with an odd number of nodes pair the last node with itself, as bitcoin does.
/// Returns `(cohashes, root)`, or `None` if `index` is out of bounds.
pub fn get_cohashes(ids: &[[u8; 32]], index: u32) -> Option<(Vec<[u8; 32]>, [u8; 32])> {
    if index as usize >= ids.len() {
        return None;
    }

    let mut curr_level = ids.to_vec();
    let mut curr_index = index as usize;
    let mut cohashes = vec![];
    while curr_level.len() > 1 {
        let mut next_level = Vec::with_capacity(curr_level.len().div_ceil(2));
        for (i, pair) in curr_level.chunks(2).enumerate() {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);

            if i == curr_index / 2 {
                cohashes.push(if curr_index % 2 == 0 { right } else { left });
            }

            let mut combined = [0u8; 64];
            combined[..32].copy_from_slice(&left);
            combined[32..].copy_from_slice(&right);
            next_level.push(sha256d::Hash::hash(&combined).to_byte_array());
        }

        curr_index /= 2;
        curr_level = next_level;
    }

    Some((cohashes, curr_level[0]))
}
