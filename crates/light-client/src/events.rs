//! Events emitted when the canonical chain changes.

use crate::header::BtcHeaderInfo;

/// A change to the canonical chain.
///
/// A single insertion yields all roll-backs (descending height) before any roll-forward
/// (ascending height).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// The header left the canonical chain.
    RollBack(BtcHeaderInfo),

    /// The header joined the canonical chain.
    RollForward(BtcHeaderInfo),
}

impl ChainEvent {
    /// Returns the header this event is about.
    pub const fn header(&self) -> &BtcHeaderInfo {
        match self {
            Self::RollBack(header) | Self::RollForward(header) => header,
        }
    }
}
