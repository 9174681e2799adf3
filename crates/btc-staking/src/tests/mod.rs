//! Scenario tests that drive a [`StakingContext`] block by block.
//!
//! The [`Harness`] owns the context along with a regtest BTC chain it mines headers for, and the
//! fixtures produce correctly signed messages for providers, stakers and covenant members.

mod delegations;
mod finality;
mod liveness;

use std::collections::BTreeMap;

use bitcoin::{block::Header, Amount, Block, BlockHash, OutPoint, Transaction, Txid};
use btc_staking_covenant::{encrypt_sign, AdaptorSignature, CovenantCommittee};
use btc_staking_db::InMemoryStore;
use btc_staking_eots::SecRand;
use btc_staking_finality::{merkle::compute_root, MsgAddFinalitySig, MsgCommitPubRand, PubRandProof};
use btc_staking_light_client::TxInclusionProof;
use btc_staking_params::{
    types::CommissionRate, EpochingParams, FinalityParams, Params, StakingParams,
};
use btc_staking_primitives::{
    pop::ProofOfPossession,
    secp::EvenSecretKey,
    types::{AppHash, BitcoinBlockHeight, BlockHeight, BlockTime},
};
use btc_staking_test_utils::prelude::*;
use btc_staking_tx_graph::{
    connectors::prelude::StakingConnector,
    keys::StakingKeys,
    transactions::prelude::{create_staking_tx, SlashingTx, UnbondingTx},
};
use secp256k1::{schnorr, Message, XOnlyPublicKey, SECP256K1};

use crate::{
    errors::StakingResult,
    events::StakingEvent,
    msgs::{
        MsgAddCovenantSigs, MsgBtcUndelegate, MsgCreateBtcDelegation, MsgCreateFinalityProvider,
        MsgInsertHeaders,
    },
    Msg, StakingContext,
};

/// Block time of the genesis block.
const GENESIS_TIME: BlockTime = 1_000;
/// Seconds between two host blocks.
pub(super) const BLOCK_SECS: BlockTime = 10;
/// Value of every test delegation.
pub(super) const STAKE: Amount = Amount::from_sat(100_000);
/// Staking timelock of every test delegation, the shortest the test params allow.
pub(super) const STAKING_TIME: u16 = 10;
/// Heights covered by a provider's randomness commitment.
const NUM_PUB_RAND: u64 = 64;
const RAND_CONTEXT: &[u8] = b"btc-staking-tests";

/// Parameters small enough that every window and timelock is reached within a few blocks.
pub(super) fn test_params(covenant_pks: Vec<XOnlyPublicKey>) -> Params {
    Params {
        staking: StakingParams {
            covenant_pks,
            covenant_quorum: 2,
            min_staking_time: STAKING_TIME,
            max_staking_time: 1_000,
            unbonding_time: 5,
            confirmation_depth: 2,
            ..Default::default()
        },
        finality: FinalityParams {
            signed_blocks_window: 4,
            max_missed_blocks: 2,
            jail_duration_secs: 60,
            min_pub_rand: 16,
            finality_sig_timeout: 1,
        },
        epoching: EpochingParams { epoch_interval: 5 },
    }
}

/// The app hash of the host block at `height`.
pub(super) fn app_hash(height: BlockHeight) -> AppHash {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_be_bytes());

    AppHash::new(bytes)
}

pub(super) struct Harness {
    pub(super) ctx: StakingContext<InMemoryStore>,
    pub(super) covenant_sks: Vec<EvenSecretKey>,
    pub(super) height: BlockHeight,
    pub(super) time: BlockTime,
    btc_tip: BlockHash,
    btc_height: BitcoinBlockHeight,
    salt: u32,
}

impl Harness {
    pub(super) fn new() -> Self {
        let (covenant_pks, covenant_sks) = generate_xonly_keys(3);
        let mut ctx = StakingContext::new(InMemoryStore::new(), test_params(covenant_pks))
            .expect("test params must be valid");

        let base = base_header();
        ctx.init_genesis(base, 0).expect("genesis must succeed");

        Self {
            ctx,
            covenant_sks,
            height: 0,
            time: GENESIS_TIME,
            btc_tip: base.block_hash(),
            btc_height: 0,
            salt: 0,
        }
    }

    pub(super) fn staking_params(&self) -> &StakingParams {
        &self.ctx.params().staking
    }

    /// Opens the next block and returns its height.
    pub(super) fn begin(&mut self) -> BlockHeight {
        self.height += 1;
        self.time += BLOCK_SECS;
        self.ctx
            .begin_block(self.height, self.time, app_hash(self.height))
            .expect("block must open");

        self.height
    }

    pub(super) fn deliver(&mut self, msg: impl Into<Msg>) -> StakingResult<()> {
        self.ctx.deliver(msg)
    }

    pub(super) fn end(&mut self) -> Vec<StakingEvent> {
        self.ctx.end_block().expect("block must commit")
    }

    /// Runs a whole block in which every message must be accepted.
    pub(super) fn run_block(&mut self, msgs: Vec<Msg>) -> Vec<StakingEvent> {
        self.begin();
        for msg in msgs {
            let kind = msg.kind();
            if let Err(e) = self.deliver(msg) {
                panic!("{kind} must be accepted: {e}");
            }
        }

        self.end()
    }

    /// Runs `n` blocks without messages and returns their events.
    pub(super) fn run_empty_blocks(&mut self, n: usize) -> Vec<StakingEvent> {
        (0..n).flat_map(|_| self.run_block(Vec::new())).collect()
    }

    /// Returns the hash and height of the harness' BTC tip.
    pub(super) const fn btc_tip(&self) -> (BlockHash, BitcoinBlockHeight) {
        (self.btc_tip, self.btc_height)
    }

    /// Mines a block with `txs` on top of the harness' BTC tip.
    pub(super) fn mine(&mut self, txs: Vec<Transaction>) -> Block {
        let block = mine_block(self.btc_tip, self.btc_height + 1, txs, self.next_salt());
        self.btc_tip = block.block_hash();
        self.btc_height += 1;

        block
    }

    /// Mines `n` empty headers on top of the harness' BTC tip.
    pub(super) fn mine_empty(&mut self, n: usize) -> Vec<Header> {
        let (tip, height) = self.btc_tip();
        self.fork(tip, height, n)
    }

    /// Mines `n` empty headers on top of `from` and makes the last one the harness' BTC tip.
    pub(super) fn fork(
        &mut self,
        from: BlockHash,
        from_height: BitcoinBlockHeight,
        n: usize,
    ) -> Vec<Header> {
        let headers = mine_chain(from, n, self.next_salt());
        if let Some(last) = headers.last() {
            self.btc_tip = last.block_hash();
            self.btc_height = from_height + n as u64;
        }

        headers
    }

    /// Registers `fp` and commits its randomness from the next height on.
    pub(super) fn register(&mut self, fp: &mut TestProvider) {
        let start = self.height + 1;
        let events = self.run_block(vec![fp.create_msg().into(), fp.commit_msg(start).into()]);

        assert!(events.contains(&StakingEvent::FinalityProviderCreated { fp_pk: fp.pk() }));
    }

    /// Creates a delegation to `fp_pks`, has it signed by a covenant quorum and confirms it.
    ///
    /// The delegation is active once this returns.
    pub(super) fn delegate(&mut self, fp_pks: Vec<XOnlyPublicKey>) -> TestDelegation {
        let del = self.create_delegation(fp_pks);

        let mut msgs = del
            .covenant_msgs
            .iter()
            .cloned()
            .map(Msg::from)
            .collect::<Vec<_>>();
        let depth = self.staking_params().confirmation_depth as usize;
        msgs.push(
            MsgInsertHeaders {
                headers: self.mine_empty(depth),
            }
            .into(),
        );

        let events = self.run_block(msgs);
        assert!(
            events.contains(&StakingEvent::DelegationActivated {
                staking_txid: del.txid()
            }),
            "delegation must activate, got {events:?}"
        );

        del
    }

    /// Includes a fresh staking tx in the BTC chain and creates the delegation, which stays
    /// pending.
    pub(super) fn create_delegation(&mut self, fp_pks: Vec<XOnlyPublicKey>) -> TestDelegation {
        let del = TestDelegation::new(
            self.staking_params(),
            fp_pks,
            &self.covenant_sks[..2],
            STAKING_TIME,
            STAKE,
        );

        let block = self.mine(vec![del.staking_tx.clone()]);
        self.run_block(vec![
            MsgInsertHeaders {
                headers: vec![block.header],
            }
            .into(),
            del.create_msg(&block).into(),
        ]);

        del
    }

    fn next_salt(&mut self) -> u32 {
        self.salt += 1_000;
        self.salt
    }
}

/// A finality provider together with its key and randomness.
pub(super) struct TestProvider {
    pub(super) sk: EvenSecretKey,
    start: BlockHeight,
    rands: Vec<SecRand>,
}

impl TestProvider {
    pub(super) fn new() -> Self {
        Self {
            sk: generate_even_secret_key(),
            start: 0,
            rands: Vec::new(),
        }
    }

    pub(super) fn pk(&self) -> XOnlyPublicKey {
        self.sk.x_only_public_key()
    }

    fn addr(&self) -> String {
        format!("fp-{}", self.pk())
    }

    pub(super) fn create_msg(&self) -> MsgCreateFinalityProvider {
        let addr = self.addr();

        MsgCreateFinalityProvider {
            pop: ProofOfPossession::new(&self.sk.keypair(), &addr),
            addr,
            btc_pk: self.pk(),
            commission: CommissionRate::try_from(500).expect("rate is in range"),
        }
    }

    /// Commits to the randomness of [`NUM_PUB_RAND`] heights starting at `start`.
    pub(super) fn commit_msg(&mut self, start: BlockHeight) -> MsgCommitPubRand {
        self.start = start;
        self.rands = (start..start + NUM_PUB_RAND)
            .map(|height| SecRand::derive(&self.sk, RAND_CONTEXT, height))
            .collect();

        let pub_rands = self.rands.iter().map(SecRand::pub_rand).collect::<Vec<_>>();
        let root = compute_root(&pub_rands).expect("randomness is not empty");

        MsgCommitPubRand::new(&self.sk, start, NUM_PUB_RAND, root)
    }

    /// Votes for `app_hash` at `height` with the committed randomness.
    pub(super) fn vote(&self, height: BlockHeight, app_hash: AppHash) -> MsgAddFinalitySig {
        let index = height - self.start;
        let pub_rands = self.rands.iter().map(SecRand::pub_rand).collect::<Vec<_>>();
        let proof = PubRandProof::generate(&pub_rands, index).expect("height is committed");

        MsgAddFinalitySig::sign(&self.sk, &self.rands[index as usize], proof, height, app_hash)
            .expect("vote must sign")
    }
}

/// A staker's delegation with all of its pre-signed txs.
pub(super) struct TestDelegation {
    pub(super) staker_sk: EvenSecretKey,
    pub(super) fp_pks: Vec<XOnlyPublicKey>,
    pub(super) staking_tx: Transaction,
    pub(super) slashing: SlashingTx,
    pub(super) unbonding: UnbondingTx,
    pub(super) unbonding_slashing: SlashingTx,
    pub(super) covenant_msgs: Vec<MsgAddCovenantSigs>,
    staking_time: u16,
    value: Amount,
}

impl TestDelegation {
    /// Builds a delegation signed by the staker and by every member in `covenant_sks`.
    pub(super) fn new(
        params: &StakingParams,
        fp_pks: Vec<XOnlyPublicKey>,
        covenant_sks: &[EvenSecretKey],
        staking_time: u16,
        value: Amount,
    ) -> Self {
        let staker_sk = generate_even_secret_key();
        let committee = CovenantCommittee::new(params.covenant_pks.clone(), params.covenant_quorum)
            .expect("committee must be valid");
        let keys = StakingKeys::new(staker_sk.x_only_public_key(), fp_pks, committee)
            .expect("keys must be distinct");
        let fp_pks = keys.fp_pks().to_vec();

        let connector = StakingConnector::new(params.network, keys, staking_time, value);
        let staking_tx = create_staking_tx([generate_outpoint()], &connector);
        let staking_outpoint = OutPoint {
            txid: staking_tx.compute_txid(),
            vout: 0,
        };

        let slashing = SlashingTx::new(&connector, staking_outpoint, params).unwrap();
        let unbonding = UnbondingTx::new(&connector, staking_outpoint, params).unwrap();
        let unbonding_slashing = SlashingTx::new(
            unbonding.connector(),
            unbonding.unbonding_outpoint(),
            params,
        )
        .unwrap();

        let mut del = Self {
            staker_sk,
            fp_pks,
            staking_tx,
            slashing,
            unbonding,
            unbonding_slashing,
            covenant_msgs: Vec::new(),
            staking_time,
            value,
        };
        del.covenant_msgs = covenant_sks.iter().map(|sk| del.covenant_msg(sk)).collect();

        del
    }

    pub(super) fn txid(&self) -> Txid {
        self.staking_tx.compute_txid()
    }

    pub(super) fn staker_sign(&self, sighash: &Message) -> schnorr::Signature {
        SECP256K1.sign_schnorr(sighash, &self.staker_sk.keypair())
    }

    /// Creates the delegation from the staking tx at index 1 of `block`.
    pub(super) fn create_msg(&self, block: &Block) -> MsgCreateBtcDelegation {
        let staker_addr = format!("staker-{}", self.staker_sk.x_only_public_key());
        let inclusion_proof = TxInclusionProof::generate(block.block_hash(), &block.txdata, 1)
            .expect("staking tx follows the coinbase");

        MsgCreateBtcDelegation {
            pop: ProofOfPossession::new(&self.staker_sk.keypair(), &staker_addr),
            staker_addr,
            staker_pk: self.staker_sk.x_only_public_key(),
            fp_pks: self.fp_pks.clone(),
            staking_time: self.staking_time,
            staking_value: self.value,
            staking_tx: self.staking_tx.clone(),
            staking_output_index: 0,
            inclusion_proof,
            slashing_tx: self.slashing.tx().clone(),
            delegator_slashing_sig: self.staker_sign(&self.slashing.sighash().unwrap()),
            unbonding_tx: self.unbonding.tx().clone(),
            unbonding_slashing_tx: self.unbonding_slashing.tx().clone(),
            delegator_unbonding_slashing_sig: self
                .staker_sign(&self.unbonding_slashing.sighash().unwrap()),
        }
    }

    /// Signs the delegation as the covenant member `member_sk`.
    pub(super) fn covenant_msg(&self, member_sk: &EvenSecretKey) -> MsgAddCovenantSigs {
        let adaptor_sigs = |slashing: &SlashingTx| {
            let sighash = slashing.sighash().unwrap();
            self.fp_pks
                .iter()
                .map(|fp_pk| (*fp_pk, encrypt_sign(member_sk, &sighash, fp_pk, generate_nonce_seed())))
                .collect::<Vec<_>>()
        };

        MsgAddCovenantSigs {
            covenant_pk: member_sk.x_only_public_key(),
            staking_txid: self.txid(),
            slashing_sigs: adaptor_sigs(&self.slashing),
            unbonding_slashing_sigs: adaptor_sigs(&self.unbonding_slashing),
            unbonding_sig: SECP256K1
                .sign_schnorr(&self.unbonding.sighash().unwrap(), &member_sk.keypair()),
        }
    }

    pub(super) fn undelegate_msg(&self) -> MsgBtcUndelegate {
        MsgBtcUndelegate {
            staking_txid: self.txid(),
            unbonding_sig: self.staker_sign(&self.unbonding.sighash().unwrap()),
        }
    }

    /// Returns the covenant adaptor signatures over the staking-output slashing tx that are
    /// encrypted under `fp_pk`, by member.
    pub(super) fn slashing_adaptor_sigs(
        &self,
        fp_pk: &XOnlyPublicKey,
    ) -> BTreeMap<XOnlyPublicKey, AdaptorSignature> {
        self.covenant_msgs
            .iter()
            .filter_map(|msg| {
                let (_, sig) = msg.slashing_sigs.iter().find(|(pk, _)| pk == fp_pk)?;
                Some((msg.covenant_pk, sig.clone()))
            })
            .collect()
    }
}
