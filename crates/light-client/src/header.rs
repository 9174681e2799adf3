//! Header records kept by the light client.

use std::fmt;

use bitcoin::{block::Header, BlockHash, Work};
use btc_staking_primitives::types::BitcoinBlockHeight;
use serde::{Deserialize, Serialize};

/// A header accepted into the chain, along with its position and cumulative work.
///
/// Records are immutable once stored. A reorg only moves the canonical index away from them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcHeaderInfo {
    header: Header,
    hash: BlockHash,
    height: BitcoinBlockHeight,

    /// Cumulative work up to and including this header, big-endian.
    work: [u8; 32],
}

impl BtcHeaderInfo {
    /// Creates a record for `header` at `height` with the given cumulative work.
    pub fn new(header: Header, height: BitcoinBlockHeight, cumulative_work: Work) -> Self {
        Self {
            hash: header.block_hash(),
            header,
            height,
            work: cumulative_work.to_be_bytes(),
        }
    }

    /// Returns the raw header.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the block hash.
    pub const fn hash(&self) -> BlockHash {
        self.hash
    }

    /// Returns the parent's block hash.
    pub const fn parent_hash(&self) -> BlockHash {
        self.header.prev_blockhash
    }

    /// Returns the height.
    pub const fn height(&self) -> BitcoinBlockHeight {
        self.height
    }

    /// Returns the cumulative work up to and including this header.
    pub fn cumulative_work(&self) -> Work {
        Work::from_be_bytes(self.work)
    }
}

impl fmt::Debug for BtcHeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtcHeaderInfo")
            .field("hash", &self.hash)
            .field("height", &self.height)
            .field("parent", &self.header.prev_blockhash)
            .finish()
    }
}
