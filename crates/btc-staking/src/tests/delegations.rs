use btc_staking_common::logging::{self, LoggerConfig};

use super::*;
use crate::{
    errors::StakingError,
    store,
    types::{BtcDelegation, DelegationState},
};

fn state(harness: &Harness, del: &TestDelegation) -> DelegationState {
    harness
        .ctx
        .delegation(&del.txid())
        .unwrap()
        .expect("delegation must exist")
        .state
}

#[test]
fn test_delegation_activates_with_quorum_and_depth() {
    logging::init(LoggerConfig::new("test-delegation-activates".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);

    let del = harness.create_delegation(vec![fp.pk()]);
    let staking_txid = del.txid();
    assert_eq!(state(&harness, &del), DelegationState::Pending);

    let events = harness.run_block(vec![del.covenant_msgs[0].clone().into()]);
    assert!(events.contains(&StakingEvent::CovenantSigsAdded {
        staking_txid,
        covenant_pk: harness.covenant_sks[0].x_only_public_key(),
    }));

    // deep enough but one signature short
    let headers = harness.mine_empty(2);
    harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert_eq!(state(&harness, &del), DelegationState::Pending);
    assert_eq!(harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(), 0);

    let events = harness.run_block(vec![del.covenant_msgs[1].clone().into()]);
    assert!(events.contains(&StakingEvent::DelegationActivated { staking_txid }));
    assert_eq!(state(&harness, &del), DelegationState::Active);

    let activated_at = harness.height;
    assert_eq!(
        harness.ctx.voting_power(&fp.pk(), activated_at).unwrap(),
        STAKE.to_sat()
    );
    assert_eq!(harness.ctx.voting_power(&fp.pk(), activated_at - 1).unwrap(), 0);

    let by_provider = harness.ctx.delegations_by_provider(&fp.pk()).unwrap();
    assert_eq!(by_provider.len(), 1);
    assert_eq!(by_provider[0].staking_txid(), staking_txid);
}

#[test]
fn test_delegation_powers_every_provider() {
    logging::init(LoggerConfig::new("test-delegation-powers-every-provider".to_string()));

    let mut harness = Harness::new();
    let mut fps = [TestProvider::new(), TestProvider::new()];
    for fp in &mut fps {
        harness.register(fp);
    }

    harness.delegate(fps.iter().map(TestProvider::pk).collect());

    let table = harness.ctx.power_table(harness.height).unwrap();
    assert_eq!(table.len(), 2);
    for fp in &fps {
        assert_eq!(table.power_of(&fp.pk()), STAKE.to_sat());
    }
    assert_eq!(
        harness.ctx.total_voting_power(harness.height).unwrap(),
        2 * STAKE.to_sat()
    );
}

#[test]
fn test_invalid_delegations_are_rejected() {
    logging::init(LoggerConfig::new("test-invalid-delegations-are-rejected".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);

    let params = harness.staking_params().clone();
    let covenant_sks = harness.covenant_sks.clone();

    // the staking block is mined but its header is not known yet
    let del = TestDelegation::new(&params, vec![fp.pk()], &covenant_sks, STAKING_TIME, STAKE);
    let block = harness.mine(vec![del.staking_tx.clone()]);

    harness.begin();
    assert!(matches!(
        harness.deliver(del.create_msg(&block)),
        Err(StakingError::InclusionProofInvalid(txid)) if txid == del.txid()
    ));

    let mut forged = del.create_msg(&block);
    forged.staker_addr = "someone-else".to_string();
    assert!(matches!(harness.deliver(forged), Err(StakingError::InvalidPop(_))));

    let short = TestDelegation::new(&params, vec![fp.pk()], &covenant_sks, STAKING_TIME / 2, STAKE);
    assert!(matches!(
        harness.deliver(short.create_msg(&block)),
        Err(StakingError::StakingTimeOutOfRange { time, .. }) if time == STAKING_TIME / 2
    ));

    let small = TestDelegation::new(
        &params,
        vec![fp.pk()],
        &covenant_sks,
        STAKING_TIME,
        Amount::from_sat(5_000),
    );
    assert!(matches!(
        harness.deliver(small.create_msg(&block)),
        Err(StakingError::StakingValueOutOfRange { .. })
    ));

    let stranger = generate_xonly_pubkey();
    let to_stranger = TestDelegation::new(&params, vec![stranger], &covenant_sks, STAKING_TIME, STAKE);
    assert!(matches!(
        harness.deliver(to_stranger.create_msg(&block)),
        Err(StakingError::UnknownProvider(pk)) if pk == stranger
    ));

    // a staking tx that does not pay to the script the keys derive
    let mut mismatched = del.create_msg(&block);
    mismatched.staking_time += 1;
    assert!(matches!(harness.deliver(mismatched), Err(StakingError::TxGraph(_))));

    harness.end();
    assert!(harness.ctx.delegation(&del.txid()).unwrap().is_none());

    // once the header is known the same delegation goes through, but only once
    harness.begin();
    harness
        .deliver(MsgInsertHeaders {
            headers: vec![block.header],
        })
        .unwrap();

    // a slashing tx the staker did not sign
    let mut unsigned = del.create_msg(&block);
    unsigned.delegator_slashing_sig = del.staker_sign(&del.unbonding.sighash().unwrap());
    assert!(matches!(harness.deliver(unsigned), Err(StakingError::TxGraph(_))));

    harness.deliver(del.create_msg(&block)).unwrap();
    assert!(matches!(
        harness.deliver(del.create_msg(&block)),
        Err(StakingError::DuplicateDelegation(txid)) if txid == del.txid()
    ));
    harness.end();

    assert_eq!(state(&harness, &del), DelegationState::Pending);
}

#[test]
fn test_invalid_covenant_sigs_are_rejected() {
    logging::init(LoggerConfig::new("test-invalid-covenant-sigs-are-rejected".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.create_delegation(vec![fp.pk()]);
    let third_member = harness.covenant_sks[2];

    harness.begin();

    let outsider = generate_even_secret_key();
    assert!(matches!(
        harness.deliver(del.covenant_msg(&outsider)),
        Err(StakingError::NotCovenantMember(pk)) if pk == outsider.x_only_public_key()
    ));

    // signatures of one member claimed by another
    let mut stolen = del.covenant_msgs[0].clone();
    stolen.covenant_pk = third_member.x_only_public_key();
    assert!(matches!(
        harness.deliver(stolen),
        Err(StakingError::InvalidCovenantSig(_))
    ));

    let mut incomplete = del.covenant_msg(&third_member);
    incomplete.slashing_sigs.clear();
    assert!(matches!(
        harness.deliver(incomplete),
        Err(StakingError::MalformedInput(_))
    ));

    let mut unknown = del.covenant_msg(&third_member);
    unknown.staking_txid = generate_txid();
    assert!(matches!(
        harness.deliver(unknown),
        Err(StakingError::UnknownDelegation(_))
    ));

    harness.deliver(del.covenant_msgs[0].clone()).unwrap();

    // the first submission of a member stands
    let resigned = del.covenant_msg(&harness.covenant_sks[0]);
    assert!(matches!(
        harness.deliver(resigned),
        Err(StakingError::DuplicateCovenantSigs { member, .. })
            if member == harness.covenant_sks[0].x_only_public_key()
    ));

    harness.end();

    let stored = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    assert_eq!(stored.covenant_sigs.len(), 1);
    assert_eq!(
        stored.covenant_sigs[&harness.covenant_sks[0].x_only_public_key()].unbonding,
        del.covenant_msgs[0].unbonding_sig
    );
}

#[test]
fn test_undelegate_waits_for_covenant_quorum() {
    logging::init(LoggerConfig::new("test-undelegate-waits-for-covenant-quorum".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.create_delegation(vec![fp.pk()]);

    harness.begin();
    harness.deliver(del.covenant_msgs[0].clone()).unwrap();

    let err = harness.deliver(del.undelegate_msg()).unwrap_err();
    assert!(matches!(err, StakingError::InsufficientQuorum { have: 1, need: 2 }));
    assert!(err.is_retryable());

    let mut forged = del.undelegate_msg();
    forged.unbonding_sig = SECP256K1.sign_schnorr(
        &del.unbonding.sighash().unwrap(),
        &generate_keypair(),
    );
    assert!(matches!(harness.deliver(forged), Err(StakingError::TxGraph(_))));

    harness.deliver(del.covenant_msgs[1].clone()).unwrap();
    harness.deliver(del.undelegate_msg()).unwrap();
    let events = harness.end();

    let unbonding_tx = events
        .iter()
        .find_map(|event| match event {
            StakingEvent::DelegationUnbonded {
                staking_txid,
                unbonding_tx,
            } if *staking_txid == del.txid() => Some(unbonding_tx),
            _ => None,
        })
        .expect("delegation must unbond");
    assert_eq!(unbonding_tx.compute_txid(), del.unbonding.tx().compute_txid());
    assert!(!unbonding_tx.input[0].witness.is_empty());

    assert_eq!(state(&harness, &del), DelegationState::Unbonded);

    harness.begin();
    assert!(matches!(
        harness.deliver(del.undelegate_msg()),
        Err(StakingError::InvalidDelegationState {
            state: DelegationState::Unbonded,
            ..
        })
    ));
    harness.end();
}

#[test]
fn test_undelegate_removes_power() {
    logging::init(LoggerConfig::new("test-undelegate-removes-power".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.delegate(vec![fp.pk()]);
    let active_at = harness.height;

    harness.run_block(vec![del.undelegate_msg().into()]);

    assert_eq!(state(&harness, &del), DelegationState::Unbonded);
    assert_eq!(harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(), 0);
    assert_eq!(
        harness.ctx.voting_power(&fp.pk(), active_at).unwrap(),
        STAKE.to_sat(),
        "earlier heights keep their power"
    );
}

#[test]
fn test_delegation_expires_with_its_timelock() {
    logging::init(LoggerConfig::new("test-delegation-expires-with-its-timelock".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.delegate(vec![fp.pk()]);

    let stored = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    let (_, tip) = harness.btc_tip();
    let remaining = (stored.end_height - tip) as usize;

    let headers = harness.mine_empty(remaining - 1);
    harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert_eq!(state(&harness, &del), DelegationState::Active);

    let headers = harness.mine_empty(1);
    let events = harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert!(events.contains(&StakingEvent::DelegationExpired {
        staking_txid: del.txid()
    }));
    assert_eq!(state(&harness, &del), DelegationState::Expired);
    assert_eq!(harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(), 0);

    harness.begin();
    assert!(matches!(
        harness.deliver(del.undelegate_msg()),
        Err(StakingError::InvalidDelegationState {
            state: DelegationState::Expired,
            ..
        })
    ));
    harness.end();
}

#[test]
fn test_reorg_deactivates_delegation() {
    logging::init(LoggerConfig::new("test-reorg-deactivates-delegation".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.delegate(vec![fp.pk()]);

    let stored = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    let inclusion = harness
        .ctx
        .btc_header_by_hash(&stored.inclusion_block)
        .unwrap()
        .expect("inclusion header must be known");
    let (_, tip) = harness.btc_tip();

    // a longer branch forking off below the staking block
    let fork_base = inclusion.header().prev_blockhash;
    let fork_len = (tip - inclusion.height() + 2) as usize;
    let headers = harness.fork(fork_base, inclusion.height() - 1, fork_len);

    let events = harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert!(events.contains(&StakingEvent::DelegationDeactivated {
        staking_txid: del.txid()
    }));
    assert!(events.iter().any(
        |event| matches!(event, StakingEvent::RollBack(info) if info.hash() == inclusion.hash())
    ));

    assert_eq!(state(&harness, &del), DelegationState::Pending);
    assert_eq!(harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(), 0);
    assert_eq!(
        harness.ctx.btc_main_chain_depth(&inclusion.hash()).unwrap(),
        None
    );
}

#[test]
fn test_signed_delegation_survives_encoding() {
    logging::init(LoggerConfig::new("test-signed-delegation-survives-encoding".to_string()));

    let mut harness = Harness::new();
    let mut fps = [TestProvider::new(), TestProvider::new()];
    for fp in &mut fps {
        harness.register(fp);
    }
    let del = harness.delegate(fps.iter().map(TestProvider::pk).collect());

    let stored = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    assert_eq!(stored.covenant_sigs.len(), 2);
    assert_eq!(stored.adaptor_sigs_for(&fps[1].pk(), true).len(), 2);

    let raw = btc_staking_db::store::encode(&stored).unwrap();
    let decoded: BtcDelegation = btc_staking_db::store::decode(&raw).unwrap();
    assert_eq!(decoded, stored);
    assert!(decoded.has_covenant_quorum().unwrap());

    let msg = Msg::from(del.covenant_msgs[0].clone());
    assert_eq!(Msg::decode(&msg.encode().unwrap()).unwrap(), msg);
}

#[test]
fn test_unbonded_delegation_expires_with_its_timelock() {
    logging::init(LoggerConfig::new("test-unbonded-delegation-expires".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);

    let unbonded = harness.delegate(vec![fp.pk()]);
    harness.run_block(vec![unbonded.undelegate_msg().into()]);
    let active = harness.delegate(vec![fp.pk()]);

    let end_height = harness.ctx.delegation(&unbonded.txid()).unwrap().unwrap().end_height;
    assert!(harness.ctx.delegation(&active.txid()).unwrap().unwrap().end_height > end_height);

    let (_, tip) = harness.btc_tip();
    let headers = harness.mine_empty((end_height - tip) as usize);
    let events = harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert!(events.contains(&StakingEvent::DelegationExpired {
        staking_txid: unbonded.txid()
    }));
    assert_eq!(state(&harness, &unbonded), DelegationState::Expired);
    assert_eq!(state(&harness, &active), DelegationState::Active);

    // terminal delegations are no longer walked on every tip change
    let live = [
        DelegationState::Pending,
        DelegationState::Active,
        DelegationState::Unbonded,
    ]
    .into_iter()
    .flat_map(|state| store::delegations_in(harness.ctx.store(), state).unwrap())
    .map(|delegation| delegation.staking_txid())
    .collect::<Vec<_>>();
    assert_eq!(live, vec![active.txid()]);

    // equivocating afterwards only slashes what is still at stake
    let height = harness.height;
    let events = harness.run_block(vec![
        fp.vote(height, app_hash(height)).into(),
        fp.vote(height, AppHash::new([0xef; 32])).into(),
    ]);
    let slashed = events
        .iter()
        .filter_map(|event| match event {
            StakingEvent::DelegationSlashed { staking_txid, .. } => Some(*staking_txid),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(slashed, vec![active.txid()]);
    assert_eq!(state(&harness, &unbonded), DelegationState::Expired);
}

#[test]
fn test_rolled_back_delegation_can_be_reanchored() {
    logging::init(LoggerConfig::new("test-rolled-back-delegation-can-be-reanchored".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    let del = harness.delegate(vec![fp.pk()]);

    let orphaned = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    let inclusion = harness
        .ctx
        .btc_header_by_hash(&orphaned.inclusion_block)
        .unwrap()
        .unwrap();
    let (_, tip) = harness.btc_tip();

    let fork_base = inclusion.header().prev_blockhash;
    let fork_len = (tip - inclusion.height() + 1) as usize;
    let mut headers = harness.fork(fork_base, inclusion.height() - 1, fork_len);

    // the staking tx makes it into the heavier branch as well
    let block = harness.mine(vec![del.staking_tx.clone()]);
    headers.push(block.header);

    harness.begin();
    harness.deliver(MsgInsertHeaders { headers }).unwrap();
    harness.deliver(del.create_msg(&block)).unwrap();
    let events = harness.end();

    assert!(events.contains(&StakingEvent::DelegationDeactivated {
        staking_txid: del.txid()
    }));
    assert!(events.contains(&StakingEvent::DelegationInclusionUpdated {
        staking_txid: del.txid(),
        inclusion_block: block.block_hash(),
    }));

    let reanchored = harness.ctx.delegation(&del.txid()).unwrap().unwrap();
    assert_eq!(reanchored.state, DelegationState::Pending);
    assert_eq!(reanchored.start_height, harness.btc_tip().1);
    assert_eq!(
        reanchored.end_height,
        reanchored.start_height + u64::from(STAKING_TIME)
    );
    assert_eq!(reanchored.covenant_sigs, orphaned.covenant_sigs);

    let depth = harness.staking_params().confirmation_depth as usize;
    let headers = harness.mine_empty(depth);
    let events = harness.run_block(vec![MsgInsertHeaders { headers }.into()]);
    assert!(events.contains(&StakingEvent::DelegationActivated {
        staking_txid: del.txid()
    }));
    assert_eq!(
        harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(),
        STAKE.to_sat()
    );

    // once anchored in the canonical chain it is a plain duplicate again
    harness.begin();
    assert!(matches!(
        harness.deliver(del.create_msg(&block)),
        Err(StakingError::DuplicateDelegation(txid)) if txid == del.txid()
    ));
    harness.end();
}
