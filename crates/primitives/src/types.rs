//! Types shared across the staking crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Height of a bitcoin block.
pub type BitcoinBlockHeight = u64;

/// Height of a block on the host chain.
pub type BlockHeight = u64;

/// Unix timestamp, in seconds, of a block on the host chain.
pub type BlockTime = u64;

/// The 32-byte application hash of a host block, i.e., what finality providers vote on.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppHash(#[serde(with = "hex::serde")] [u8; 32]);

impl AppHash {
    /// Wraps raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for AppHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for AppHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(bytes.try_into()?))
    }
}

impl AsRef<[u8]> for AppHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AppHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AppHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppHash({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_hash_serializes_as_hex() {
        let hash = AppHash::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();

        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        assert_eq!(serde_json::from_str::<AppHash>(&json).unwrap(), hash);
        assert!(AppHash::try_from(&[0u8; 31][..]).is_err());
    }
}
