//! Key layout of the staking state.
//!
//! Every record lives under a one-byte table prefix. Integers are big-endian so that iterating a
//! prefix walks heights in ascending order.

/// Table prefixes.
pub mod prefix {
    /// `hash -> BtcHeaderInfo`, including superseded headers.
    pub const BTC_HEADER: u8 = 0x01;
    /// `height -> hash` of the canonical chain.
    pub const BTC_HEIGHT_INDEX: u8 = 0x02;
    /// Singleton holding the canonical tip hash.
    pub const BTC_TIP: u8 = 0x03;

    /// `fp pk -> FinalityProvider`.
    pub const FINALITY_PROVIDER: u8 = 0x10;
    /// `staking txid -> BtcDelegation`.
    pub const BTC_DELEGATION: u8 = 0x11;
    /// `fp pk || staking txid -> ()`, so delegations can be listed per provider.
    pub const FP_DELEGATIONS: u8 = 0x12;
    /// `inclusion block hash || staking txid -> ()`, so reorgs can find affected delegations.
    pub const DELEGATIONS_BY_BLOCK: u8 = 0x13;
    /// `state || staking txid -> ()` for delegations that are not final yet.
    pub const DELEGATIONS_BY_STATE: u8 = 0x14;

    /// `height || fp pk -> power`.
    pub const VOTING_POWER: u8 = 0x20;
    /// `height -> total power`, one entry per recorded snapshot.
    pub const VOTING_POWER_SNAPSHOT: u8 = 0x21;

    /// `fp pk || start height -> PubRandCommitment`.
    pub const PUB_RAND_COMMIT: u8 = 0x30;
    /// `height || fp pk -> FinalityVote`.
    pub const FINALITY_VOTE: u8 = 0x31;
    /// `fp pk || height -> Evidence`.
    pub const EVIDENCE: u8 = 0x32;
    /// `fp pk -> SigningInfo`.
    pub const SIGNING_INFO: u8 = 0x33;
    /// `fp pk || window index -> ()`, present when the vote at that index was missed.
    pub const MISSED_BLOCK: u8 = 0x34;
    /// `height -> IndexedBlock`.
    pub const INDEXED_BLOCK: u8 = 0x35;
    /// Singleton holding the lowest height that is not finalized yet.
    pub const NEXT_HEIGHT_TO_FINALIZE: u8 = 0x36;

    /// Singleton holding the current epoch.
    pub const EPOCH: u8 = 0x40;
    /// Singleton holding the configured epoching parameters.
    pub const EPOCHING_PARAMS: u8 = 0x41;
}

/// Builder for a store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<u8>);

impl Key {
    /// Starts a key in the table `prefix`.
    pub fn new(prefix: u8) -> Self {
        Self(vec![prefix])
    }

    /// Appends raw bytes.
    pub fn push(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.0.extend_from_slice(bytes.as_ref());
        self
    }

    /// Appends a big-endian integer.
    pub fn push_u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Returns the encoded key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reads a big-endian integer from `key` at `offset`.
pub fn read_u64(key: &[u8], offset: usize) -> Option<u64> {
    let bytes = key.get(offset..offset + 8)?;

    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}
