use btc_staking_common::logging::{self, LoggerConfig};
use btc_staking_finality::VoteState;

use super::*;
use crate::{errors::StakingError, msgs::MsgReportSlashingTx, types::DelegationState};

/// Registers a provider and activates a delegation to it.
///
/// Returns the height at which the delegation became active.
fn setup(harness: &mut Harness, fp: &mut TestProvider) -> (TestDelegation, BlockHeight) {
    harness.register(fp);
    let del = harness.delegate(vec![fp.pk()]);

    (del, harness.height)
}

fn finalized_heights(events: &[StakingEvent]) -> Vec<BlockHeight> {
    events
        .iter()
        .filter_map(|event| match event {
            StakingEvent::BlockFinalized { height, .. } => Some(*height),
            _ => None,
        })
        .collect()
}

#[test]
fn test_votes_finalize_blocks() {
    logging::init(LoggerConfig::new("test-votes-finalize-blocks".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    let (_, active_at) = setup(&mut harness, &mut fp);

    // blocks before any power is active never hold finalization back
    assert_eq!(harness.ctx.next_height_to_finalize().unwrap(), Some(active_at));

    let next = active_at + 1;
    let events = harness.run_block(vec![
        fp.vote(active_at, app_hash(active_at)).into(),
        fp.vote(next, app_hash(next)).into(),
    ]);

    assert!(events.contains(&StakingEvent::FinalityVoteAdded {
        fp_pk: fp.pk(),
        height: active_at,
        app_hash: app_hash(active_at),
    }));
    assert_eq!(finalized_heights(&events), vec![active_at, next]);

    for height in [active_at, next] {
        let block = harness.ctx.indexed_block(height).unwrap().unwrap();
        assert!(block.finalized);
        assert_eq!(block.app_hash, app_hash(height));
    }
    assert_eq!(harness.ctx.next_height_to_finalize().unwrap(), Some(next + 1));
    assert!(matches!(
        harness.ctx.vote(&fp.pk(), active_at).unwrap(),
        VoteState::Voted(vote) if vote.app_hash == app_hash(active_at)
    ));
}

#[test]
fn test_blocks_finalize_in_order() {
    logging::init(LoggerConfig::new("test-blocks-finalize-in-order".to_string()));

    let mut harness = Harness::new();
    let mut fps = [TestProvider::new(), TestProvider::new()];
    for fp in &mut fps {
        harness.register(fp);
    }
    harness.delegate(fps.iter().map(TestProvider::pk).collect());
    let active_at = harness.height;

    // half the power behind the block is not a quorum
    let events = harness.run_block(vec![fps[0].vote(active_at, app_hash(active_at)).into()]);
    assert!(finalized_heights(&events).is_empty());

    let fork = AppHash::new([0xab; 32]);
    let next = active_at + 1;
    let events = harness.run_block(vec![
        fps[1].vote(active_at, fork).into(),
        fps[0].vote(next, app_hash(next)).into(),
        fps[1].vote(next, app_hash(next)).into(),
    ]);

    // the later block has a quorum but the earlier one holds it back
    assert!(finalized_heights(&events).is_empty());
    assert!(!harness.ctx.indexed_block(next).unwrap().unwrap().finalized);
    assert_eq!(harness.ctx.next_height_to_finalize().unwrap(), Some(active_at));
}

#[test]
fn test_invalid_votes_are_rejected() {
    logging::init(LoggerConfig::new("test-invalid-votes-are-rejected".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    let (_, active_at) = setup(&mut harness, &mut fp);

    let mut powerless = TestProvider::new();
    harness.register(&mut powerless);

    let mut stranger = TestProvider::new();
    stranger.commit_msg(active_at);

    let height = harness.begin();

    assert!(matches!(
        harness.deliver(fp.vote(height + 1, app_hash(height + 1))),
        Err(StakingError::BlockNotIndexed(h)) if h == height + 1
    ));
    assert!(matches!(
        harness.deliver(powerless.vote(height, app_hash(height))),
        Err(StakingError::NoVotingPower { fp_pk, .. }) if fp_pk == powerless.pk()
    ));
    assert!(matches!(
        harness.deliver(stranger.vote(active_at, app_hash(active_at))),
        Err(StakingError::UnknownProvider(pk)) if pk == stranger.pk()
    ));

    // a signature over another block does not verify
    let mut tampered = fp.vote(active_at, app_hash(active_at));
    tampered.app_hash = app_hash(height);
    assert!(matches!(harness.deliver(tampered), Err(StakingError::Finality(_))));

    let vote = fp.vote(active_at, app_hash(active_at));
    harness.deliver(vote.clone()).unwrap();
    harness.deliver(vote).unwrap();

    let events = harness.end();
    let num_votes = events
        .iter()
        .filter(|event| matches!(event, StakingEvent::FinalityVoteAdded { .. }))
        .count();
    assert_eq!(num_votes, 1, "a repeated vote is a no-op");
}

#[test]
fn test_double_vote_slashes_provider() {
    logging::init(LoggerConfig::new("test-double-vote-slashes-provider".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    let (del, active_at) = setup(&mut harness, &mut fp);

    let fork = AppHash::new([0xcd; 32]);
    let events = harness.run_block(vec![
        fp.vote(active_at, app_hash(active_at)).into(),
        fp.vote(active_at, fork).into(),
    ]);
    let slashed_at = harness.height;

    let evidence = events
        .iter()
        .find_map(|event| match event {
            StakingEvent::EvidenceDetected(evidence) => Some(evidence),
            _ => None,
        })
        .expect("double vote must be detected");
    assert_eq!(evidence.fp_pk, fp.pk());
    assert_eq!(evidence.voted_app_hash, app_hash(active_at));
    assert_eq!(evidence.conflicting_app_hash, fork);

    assert!(events.contains(&StakingEvent::FinalityProviderSlashed {
        fp_pk: fp.pk(),
        height: slashed_at,
    }));

    let slashing_tx = events
        .iter()
        .find_map(|event| match event {
            StakingEvent::DelegationSlashed {
                staking_txid,
                slashing_tx,
                ..
            } if *staking_txid == del.txid() => slashing_tx.clone(),
            _ => None,
        })
        .expect("slashing tx must be completed with the extracted key");
    assert_eq!(slashing_tx.compute_txid(), del.slashing.tx().compute_txid());
    assert!(!slashing_tx.input[0].witness.is_empty());

    assert_eq!(harness.ctx.evidence(&fp.pk()).unwrap().as_ref(), Some(&**evidence));
    let provider = harness.ctx.finality_provider(&fp.pk()).unwrap().unwrap();
    assert_eq!(provider.slashed_height, Some(slashed_at));
    assert_eq!(
        harness.ctx.delegation(&del.txid()).unwrap().unwrap().state,
        DelegationState::Slashed
    );
    assert_eq!(harness.ctx.voting_power(&fp.pk(), slashed_at).unwrap(), 0);

    harness.begin();
    assert!(matches!(
        harness.deliver(fp.vote(slashed_at, app_hash(slashed_at))),
        Err(StakingError::ProviderSlashed(_))
    ));
    harness.end();
}

#[test]
fn test_reported_slashing_tx_slashes_provider() {
    logging::init(LoggerConfig::new("test-reported-slashing-tx-slashes-provider".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    let (del, _) = setup(&mut harness, &mut fp);

    // the provider's key leaked and someone broadcast the slashing tx
    let staker_sig = del.staker_sign(&del.slashing.sighash().unwrap());
    let signed = del
        .slashing
        .clone()
        .finalize_with_provider_key(staker_sig, &fp.sk, &del.slashing_adaptor_sigs(&fp.pk()))
        .unwrap();
    let unrelated = generate_tx(1, 1);
    let block = harness.mine(vec![signed.clone(), unrelated.clone()]);

    let report = |tx: &Transaction, position: u32| MsgReportSlashingTx {
        staking_txid: del.txid(),
        slashing_tx: tx.clone(),
        inclusion_proof: TxInclusionProof::generate(block.block_hash(), &block.txdata, position)
            .unwrap(),
    };

    harness.begin();
    harness
        .deliver(MsgInsertHeaders {
            headers: vec![block.header],
        })
        .unwrap();
    assert!(matches!(
        harness.deliver(report(&signed, 1)),
        Err(StakingError::NotConfirmed { block_hash, .. }) if block_hash == block.block_hash()
    ));
    harness.end();

    let depth = harness.staking_params().confirmation_depth as usize;
    let headers = harness.mine_empty(depth);
    harness.begin();
    harness.deliver(MsgInsertHeaders { headers }).unwrap();

    assert!(matches!(
        harness.deliver(report(&unrelated, 2)),
        Err(StakingError::TxGraph(_))
    ));

    harness.deliver(report(&signed, 1)).unwrap();
    assert!(matches!(
        harness.deliver(report(&signed, 1)),
        Err(StakingError::InvalidDelegationState {
            state: DelegationState::Slashed,
            ..
        })
    ));
    let events = harness.end();

    assert!(events.contains(&StakingEvent::FinalityProviderSlashed {
        fp_pk: fp.pk(),
        height: harness.height,
    }));
    assert!(harness
        .ctx
        .finality_provider(&fp.pk())
        .unwrap()
        .unwrap()
        .is_slashed());
    assert_eq!(
        harness.ctx.delegation(&del.txid()).unwrap().unwrap().state,
        DelegationState::Slashed
    );
}
