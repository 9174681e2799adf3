//! Events emitted while processing blocks, and the listeners that receive them.
//!
//! Events are buffered with the block's writes and dispatched to listeners, in emission order,
//! once the block commits. A discarded block emits nothing.

use bitcoin::{BlockHash, Transaction, Txid};
use btc_staking_epoching::Epoch;
use btc_staking_finality::Evidence;
use btc_staking_light_client::BtcHeaderInfo;
use btc_staking_primitives::types::{AppHash, BlockHeight, BlockTime};
use secp256k1::XOnlyPublicKey;

/// A state change observed by the staking core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    /// A header left the canonical BTC chain.
    RollBack(BtcHeaderInfo),

    /// A header joined the canonical BTC chain.
    RollForward(BtcHeaderInfo),

    /// A provider voted for two blocks at one height.
    EvidenceDetected(Box<Evidence>),

    /// A delegation was slashed because of one of its providers.
    ///
    /// The slashing txs are fully signed when the covenant signatures allow it and can be
    /// broadcast as they are.
    DelegationSlashed {
        /// The delegation.
        staking_txid: Txid,
        /// The slashed provider.
        fp_pk: XOnlyPublicKey,
        /// The signed slashing tx of the staking output.
        slashing_tx: Option<Transaction>,
        /// The signed slashing tx of the unbonding output.
        unbonding_slashing_tx: Option<Transaction>,
    },

    /// A provider registered.
    FinalityProviderCreated {
        /// The provider.
        fp_pk: XOnlyPublicKey,
    },

    /// A provider was slashed.
    FinalityProviderSlashed {
        /// The provider.
        fp_pk: XOnlyPublicKey,
        /// Host height of the slashing.
        height: BlockHeight,
    },

    /// A provider was jailed for missing votes.
    FinalityProviderJailed {
        /// The provider.
        fp_pk: XOnlyPublicKey,
        /// Block time from which it may unjail.
        jailed_until: BlockTime,
    },

    /// A provider left jail.
    FinalityProviderUnjailed {
        /// The provider.
        fp_pk: XOnlyPublicKey,
    },

    /// A delegation was created and waits for covenant signatures.
    DelegationCreated {
        /// The delegation.
        staking_txid: Txid,
    },

    /// A covenant member signed a delegation.
    CovenantSigsAdded {
        /// The delegation.
        staking_txid: Txid,
        /// The member.
        covenant_pk: XOnlyPublicKey,
    },

    /// A delegation started contributing voting power.
    DelegationActivated {
        /// The delegation.
        staking_txid: Txid,
    },

    /// A delegation's staking tx left the canonical chain; it waits for confirmation again.
    DelegationDeactivated {
        /// The delegation.
        staking_txid: Txid,
    },

    /// A pending delegation whose staking tx was rolled back was proven in a canonical block
    /// again.
    DelegationInclusionUpdated {
        /// The delegation.
        staking_txid: Txid,
        /// The block that includes the staking tx now.
        inclusion_block: BlockHash,
    },

    /// A staker unbonded.
    DelegationUnbonded {
        /// The delegation.
        staking_txid: Txid,
        /// The signed unbonding tx.
        unbonding_tx: Transaction,
    },

    /// A delegation's timelock elapsed.
    DelegationExpired {
        /// The delegation.
        staking_txid: Txid,
    },

    /// A provider committed to public randomness.
    PubRandCommitted {
        /// The provider.
        fp_pk: XOnlyPublicKey,
        /// First height covered.
        start_height: BlockHeight,
        /// Number of heights covered.
        num_pub_rand: u64,
    },

    /// A finality vote was recorded.
    FinalityVoteAdded {
        /// The provider.
        fp_pk: XOnlyPublicKey,
        /// The height voted on.
        height: BlockHeight,
        /// The block voted for.
        app_hash: AppHash,
    },

    /// A host block gathered a finality quorum.
    BlockFinalized {
        /// Height of the block.
        height: BlockHeight,
        /// The block's app hash.
        app_hash: AppHash,
    },

    /// A new epoch started.
    EpochAdvanced(Epoch),
}

/// Receives committed events.
///
/// Listeners run synchronously on the thread that ends the block and must not fail.
pub trait EventListener {
    /// Handles one event.
    fn on_event(&mut self, event: &StakingEvent);
}

impl<F: FnMut(&StakingEvent)> EventListener for F {
    fn on_event(&mut self, event: &StakingEvent) {
        self(event)
    }
}
