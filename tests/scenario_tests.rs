//! End-to-end trigger-planning scenarios, driven through the public
//! `detector` + `poller` surface with a stubbed hosting client so no
//! network access is required.

mod common;

use std::collections::HashMap;

use common::{config_with, parallel_policy, repository, tick, StubClient};
use sentry_watch::detector::SeenMap;

/// No change across three ticks never produces a trigger.
#[tokio::test]
async fn no_change_across_ticks_never_deploys() {
    let config = config_with(vec![repository("r1", None, "main")], HashMap::new());
    let seen = SeenMap::new();
    let stub = StubClient::constant(&[("r1", "main")], "aaaaaaaa");

    for _ in 0..3 {
        let plan = tick(&config, &seen, &stub).await;
        assert!(plan.is_empty(), "no change should never produce a trigger");
    }
}

/// The very first tick after startup never deploys, even though the
/// hosting client returned a perfectly valid commit.
#[tokio::test]
async fn first_observation_never_deploys() {
    let config = config_with(vec![repository("r1", None, "main")], HashMap::new());
    let seen = SeenMap::new();
    let stub = StubClient::constant(&[("r1", "main")], "deadbeef");

    let plan = tick(&config, &seen, &stub).await;
    assert!(plan.is_empty());
}

/// A single ungrouped repository changing between two ticks lands in the
/// individuals set.
#[tokio::test]
async fn single_ungrouped_change_goes_to_individuals() {
    let config = config_with(vec![repository("r1", None, "main")], HashMap::new());
    let seen = SeenMap::new();
    let mut sequences = HashMap::new();
    sequences.insert("r1:main".to_string(), vec!["aaaa".to_string(), "bbbb".to_string()]);
    let stub = StubClient::new(sequences);

    let first = tick(&config, &seen, &stub).await;
    assert!(first.is_empty());

    let second = tick(&config, &seen, &stub).await;
    assert!(second.groups.is_empty());
    assert_eq!(second.individuals.len(), 1);
    assert!(second.individuals.contains("r1"));
}

/// Any subset of a group changing amplifies to the full declared
/// membership, dispatched as exactly one group trigger.
#[tokio::test]
async fn group_change_amplifies_to_full_membership() {
    let mut groups = HashMap::new();
    groups.insert("G".to_string(), parallel_policy(2, true, 600));
    let config = config_with(
        vec![
            repository("r1", Some("G"), "main"),
            repository("r2", Some("G"), "main"),
            repository("r3", Some("G"), "main"),
        ],
        groups,
    );
    let seen = SeenMap::new();

    let mut sequences = HashMap::new();
    sequences.insert("r1:main".to_string(), vec!["a0".to_string(), "a0".to_string()]);
    sequences.insert("r2:main".to_string(), vec!["b0".to_string(), "b1".to_string()]);
    sequences.insert("r3:main".to_string(), vec!["c0".to_string(), "c0".to_string()]);
    let stub = StubClient::new(sequences);

    let baseline = tick(&config, &seen, &stub).await;
    assert!(baseline.is_empty());

    let second = tick(&config, &seen, &stub).await;
    assert_eq!(second.groups.len(), 1, "group executor dispatched exactly once");
    let trigger = &second.groups["G"];
    assert_eq!(trigger.members, vec!["r1".to_string(), "r2".to_string(), "r3".to_string()]);
    assert_eq!(trigger.triggering_repo, "r2");
    assert!(second.individuals.is_empty());
}

/// Two consecutive no-op ticks after the baseline both produce empty plans
/// (idempotent probing).
#[tokio::test]
async fn consecutive_no_op_ticks_are_idempotent() {
    let config = config_with(vec![repository("r1", None, "main")], HashMap::new());
    let seen = SeenMap::new();
    let stub = StubClient::constant(&[("r1", "main")], "cccccccc");

    let _baseline = tick(&config, &seen, &stub).await;
    let tick_a = tick(&config, &seen, &stub).await;
    let tick_b = tick(&config, &seen, &stub).await;
    assert!(tick_a.is_empty());
    assert!(tick_b.is_empty());
}
