//! Read-only queries over the committed state.
//!
//! Queries never see the writes of an open block.

use bitcoin::{BlockHash, Txid};
use btc_staking_db::KvStore;
use btc_staking_epoching::{epoch, Epoch, EpochNumber};
use btc_staking_finality::{
    commitment, evidence, liveness, tally, vote, Evidence, IndexedBlock, PubRandCommit,
    SigningInfo, VoteState,
};
use btc_staking_light_client::BtcHeaderInfo;
use btc_staking_primitives::types::{BitcoinBlockHeight, BlockHeight};
use btc_staking_voting_power::{power_table_at, total_power_at, voting_power, PowerTable};
use secp256k1::XOnlyPublicKey;

use crate::{
    context::StakingContext,
    errors::StakingResult,
    store,
    types::{BtcDelegation, FinalityProvider},
};

impl<S: KvStore> StakingContext<S> {
    /// Returns the provider registered under `fp_pk`.
    pub fn finality_provider(&self, fp_pk: &XOnlyPublicKey) -> StakingResult<Option<FinalityProvider>> {
        store::provider(&self.store, fp_pk)
    }

    /// Returns every registered provider, ordered by key.
    pub fn finality_providers(&self) -> StakingResult<Vec<FinalityProvider>> {
        store::providers(&self.store)
    }

    /// Returns the delegation whose staking tx is `staking_txid`.
    pub fn delegation(&self, staking_txid: &Txid) -> StakingResult<Option<BtcDelegation>> {
        store::delegation(&self.store, staking_txid)
    }

    /// Returns every delegation to `fp_pk`, ordered by staking txid.
    pub fn delegations_by_provider(&self, fp_pk: &XOnlyPublicKey) -> StakingResult<Vec<BtcDelegation>> {
        let mut delegations = Vec::new();
        for staking_txid in store::delegation_ids_by_provider(&self.store, fp_pk)? {
            if let Some(delegation) = store::delegation(&self.store, &staking_txid)? {
                delegations.push(delegation);
            }
        }

        Ok(delegations)
    }

    /// Returns the voting power of `fp_pk` at `height`.
    pub fn voting_power(&self, fp_pk: &XOnlyPublicKey, height: BlockHeight) -> StakingResult<u64> {
        Ok(voting_power(&self.store, fp_pk, height)?)
    }

    /// Returns the power table in force at `height`.
    pub fn power_table(&self, height: BlockHeight) -> StakingResult<PowerTable> {
        Ok(power_table_at(&self.store, height)?)
    }

    /// Returns the total voting power at `height`.
    pub fn total_voting_power(&self, height: BlockHeight) -> StakingResult<u64> {
        Ok(total_power_at(&self.store, height)?)
    }

    /// Returns the current epoch.
    pub fn current_epoch(&self) -> StakingResult<Epoch> {
        Ok(epoch::current_epoch(&self.store)?)
    }

    /// Returns the epoch numbered `epoch_number`, if it started.
    pub fn epoch(&self, epoch_number: EpochNumber) -> StakingResult<Option<Epoch>> {
        Ok(epoch::epoch(&self.store, epoch_number)?)
    }

    /// Returns the tip of the canonical BTC chain.
    pub fn btc_tip(&self) -> StakingResult<BtcHeaderInfo> {
        Ok(self.light_client.tip(&self.store)?)
    }

    /// Returns the BTC header with `hash`, canonical or not.
    pub fn btc_header_by_hash(&self, hash: &BlockHash) -> StakingResult<Option<BtcHeaderInfo>> {
        Ok(self.light_client.header_by_hash(&self.store, hash)?)
    }

    /// Returns the canonical BTC header at `height`.
    pub fn btc_header_at_height(&self, height: BitcoinBlockHeight) -> StakingResult<Option<BtcHeaderInfo>> {
        Ok(self.light_client.header_at_height(&self.store, height)?)
    }

    /// Returns the number of canonical BTC blocks on top of `hash`.
    pub fn btc_main_chain_depth(&self, hash: &BlockHash) -> StakingResult<Option<u64>> {
        Ok(self.light_client.main_chain_depth(&self.store, hash)?)
    }

    /// Returns the indexed host block at `height`.
    pub fn indexed_block(&self, height: BlockHeight) -> StakingResult<Option<IndexedBlock>> {
        Ok(tally::indexed_block(&self.store, height)?)
    }

    /// Returns the lowest height that is not finalized yet.
    pub fn next_height_to_finalize(&self) -> StakingResult<Option<BlockHeight>> {
        Ok(tally::next_height_to_finalize(&self.store)?)
    }

    /// Returns the liveness record of `fp_pk`.
    pub fn signing_info(&self, fp_pk: &XOnlyPublicKey) -> StakingResult<Option<SigningInfo>> {
        Ok(liveness::signing_info(&self.store, fp_pk)?)
    }

    /// Returns the earliest evidence of double voting by `fp_pk`.
    pub fn evidence(&self, fp_pk: &XOnlyPublicKey) -> StakingResult<Option<Evidence>> {
        Ok(evidence::first_evidence(&self.store, fp_pk)?)
    }

    /// Returns the vote of `fp_pk` at `height`.
    pub fn vote(&self, fp_pk: &XOnlyPublicKey, height: BlockHeight) -> StakingResult<VoteState> {
        Ok(vote::vote_state(&self.store, fp_pk, height)?)
    }

    /// Returns the randomness commitment of `fp_pk` covering `height`.
    pub fn pub_rand_commit_at(
        &self,
        fp_pk: &XOnlyPublicKey,
        height: BlockHeight,
    ) -> StakingResult<Option<PubRandCommit>> {
        Ok(commitment::commitment_at(&self.store, fp_pk, height)?)
    }
}
