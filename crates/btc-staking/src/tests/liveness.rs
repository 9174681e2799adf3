use btc_staking_common::logging::{self, LoggerConfig};
use btc_staking_finality::FinalityError;

use super::*;
use crate::{errors::StakingError, msgs::MsgUnjailFinalityProvider};

fn jailed_until(events: &[StakingEvent], fp_pk: &XOnlyPublicKey) -> Option<BlockTime> {
    events.iter().find_map(|event| match event {
        StakingEvent::FinalityProviderJailed {
            fp_pk: jailed,
            jailed_until,
        } if jailed == fp_pk => Some(*jailed_until),
        _ => None,
    })
}

#[test]
fn test_voting_provider_stays_unjailed() {
    logging::init(LoggerConfig::new("test-voting-provider-stays-unjailed".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    harness.delegate(vec![fp.pk()]);

    for _ in 0..8 {
        let last = harness.height;
        let events = harness.run_block(vec![fp.vote(last, app_hash(last)).into()]);
        assert_eq!(jailed_until(&events, &fp.pk()), None);
    }

    let info = harness.ctx.signing_info(&fp.pk()).unwrap().unwrap();
    assert_eq!(info.missed_blocks_counter, 0);
    assert_eq!(info.jailed_until, None);
    assert_eq!(
        harness.ctx.next_height_to_finalize().unwrap(),
        Some(harness.height),
        "every block but the last one is voted"
    );
}

#[test]
fn test_missed_votes_jail_until_unjailed() {
    logging::init(LoggerConfig::new("test-missed-votes-jail-until-unjailed".to_string()));

    let mut harness = Harness::new();
    let mut fp = TestProvider::new();
    harness.register(&mut fp);
    harness.delegate(vec![fp.pk()]);
    let active_at = harness.height;

    let finality = harness.ctx.params().finality;
    // missed votes are counted once a vote's timeout passes, and only a full window jails
    let jailing_height = active_at + finality.signed_blocks_window + finality.finality_sig_timeout;

    let mut jail = None;
    while harness.height < jailing_height {
        let events = harness.run_block(Vec::new());
        if let Some(until) = jailed_until(&events, &fp.pk()) {
            jail = Some((harness.height, until));
        }

        if harness.height == 2 + active_at {
            harness.begin();
            assert!(matches!(
                harness.deliver(MsgUnjailFinalityProvider { fp_pk: fp.pk() }),
                Err(StakingError::Finality(FinalityError::NotJailed(_)))
            ));
            harness.end();
        }
    }

    let (jailed_at, jailed_until) = jail.expect("a silent provider must be jailed");
    assert_eq!(jailed_at, jailing_height);
    assert_eq!(jailed_until, harness.time + finality.jail_duration_secs);

    let provider = harness.ctx.finality_provider(&fp.pk()).unwrap().unwrap();
    assert!(provider.jailed);
    assert_eq!(provider.jailed_until, Some(jailed_until));
    assert_eq!(harness.ctx.voting_power(&fp.pk(), jailed_at).unwrap(), 0);
    assert_eq!(
        harness.ctx.voting_power(&fp.pk(), jailed_at - 1).unwrap(),
        STAKE.to_sat()
    );

    // jailed heights have no power to vote with
    harness.begin();
    assert!(matches!(
        harness.deliver(fp.vote(jailed_at, app_hash(jailed_at))),
        Err(StakingError::NoVotingPower { .. })
    ));
    assert!(matches!(
        harness.deliver(MsgUnjailFinalityProvider { fp_pk: fp.pk() }),
        Err(StakingError::Finality(FinalityError::StillJailed { .. }))
    ));
    harness.end();

    while harness.time + BLOCK_SECS < jailed_until {
        harness.run_empty_blocks(1);
    }

    let events = harness.run_block(vec![MsgUnjailFinalityProvider { fp_pk: fp.pk() }.into()]);
    assert!(events.contains(&StakingEvent::FinalityProviderUnjailed { fp_pk: fp.pk() }));

    let provider = harness.ctx.finality_provider(&fp.pk()).unwrap().unwrap();
    assert!(!provider.jailed);
    assert_eq!(
        harness.ctx.voting_power(&fp.pk(), harness.height).unwrap(),
        STAKE.to_sat()
    );

    let info = harness.ctx.signing_info(&fp.pk()).unwrap().unwrap();
    assert_eq!(info.start_height, harness.height);
    assert_eq!(info.missed_blocks_counter, 0);
}
