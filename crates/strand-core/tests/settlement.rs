use std::sync::Arc;

use strand_canonical::{payload_ref, ActorId, PrincipalId, Timestamp};
use strand_core::{
    BranchState, CoreError, EngineConfig, FixedClock, MemorySink, Notification, SettlementEngine,
};

fn make_principal(s: &str) -> PrincipalId {
    PrincipalId::parse(s).unwrap()
}

fn make_timestamp() -> Timestamp {
    Timestamp::parse("2024-01-01T00:00:00Z").unwrap()
}

fn make_engine() -> (SettlementEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = SettlementEngine::with_clock(
        EngineConfig::default(),
        make_principal("acct:owner"),
        sink.clone(),
        Arc::new(FixedClock::new(make_timestamp())),
    )
    .unwrap();
    (engine, sink)
}

fn register_all(engine: &SettlementEngine, actor: &ActorId, tokens: &[u64]) {
    let ctx = engine.call_as(actor);
    for &t in tokens {
        engine
            .registry()
            .register_branch(&ctx, actor, t, payload_ref(&t.to_be_bytes()))
            .unwrap();
    }
}

#[test]
fn settling_middle_token_discards_lower_and_keeps_higher() {
    let (engine, sink) = make_engine();
    let alice = make_principal("acct:alice");
    register_all(&engine, &alice, &[1, 2, 3]);
    sink.drain();

    let ctx = engine.call_as(&alice);
    let discarded = engine.registry().settle(&ctx, &alice, 2).unwrap();

    assert_eq!(discarded, vec![1]);
    let reg = engine.registry();
    assert_eq!(reg.branch_state(&alice, 1), Some(BranchState::Discarded));
    assert_eq!(reg.branch_state(&alice, 2), Some(BranchState::Settled));
    assert_eq!(reg.branch_state(&alice, 3), Some(BranchState::Pending));
    assert_eq!(reg.last_settled(&alice), 2);
    assert_eq!(reg.list_pending(&alice), vec![3]);
    assert!(reg.has_pending(&alice));

    assert_eq!(
        sink.snapshot(),
        vec![Notification::Collapse {
            actor: alice.clone(),
            settled: 2,
            discarded: vec![1],
            resolved_at: make_timestamp(),
        }]
    );
}

#[test]
fn settling_the_last_pending_token_empties_the_set() {
    let (engine, sink) = make_engine();
    let alice = make_principal("acct:alice");
    register_all(&engine, &alice, &[1, 2, 3]);
    let ctx = engine.call_as(&alice);
    engine.registry().settle(&ctx, &alice, 2).unwrap();
    sink.drain();

    let discarded = engine.registry().settle(&ctx, &alice, 3).unwrap();

    assert!(discarded.is_empty());
    let reg = engine.registry();
    assert!(!reg.has_pending(&alice));
    assert!(reg.list_pending(&alice).is_empty());
    assert_eq!(reg.last_settled(&alice), 3);
    assert_eq!(reg.branch_state(&alice, 1), Some(BranchState::Discarded));
    assert_eq!(reg.branch_state(&alice, 2), Some(BranchState::Settled));
    assert_eq!(reg.branch_state(&alice, 3), Some(BranchState::Settled));
    assert_eq!(
        sink.snapshot(),
        vec![Notification::Collapse {
            actor: alice.clone(),
            settled: 3,
            discarded: vec![],
            resolved_at: make_timestamp(),
        }]
    );
}

#[test]
fn settling_below_watermark_fails_already_settled() {
    let (engine, _sink) = make_engine();
    let alice = make_principal("acct:alice");
    register_all(&engine, &alice, &[1, 2, 3]);
    let ctx = engine.call_as(&alice);
    engine.registry().settle(&ctx, &alice, 2).unwrap();

    let err = engine.registry().settle(&ctx, &alice, 1).unwrap_err();
    assert!(matches!(
        err,
        CoreError::AlreadySettled {
            token: 1,
            last_settled: 2,
            ..
        }
    ));
    let err = engine.registry().settle(&ctx, &alice, 2).unwrap_err();
    assert!(matches!(err, CoreError::AlreadySettled { .. }));
    assert_eq!(
        engine.registry().branch_state(&alice, 1),
        Some(BranchState::Discarded)
    );
}

#[test]
fn settling_unknown_token_fails_invalid_token() {
    let (engine, sink) = make_engine();
    let alice = make_principal("acct:alice");
    let ctx = engine.call_as(&alice);

    let err = engine.registry().settle(&ctx, &alice, 7).unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidToken {
            token: 7,
            last_settled: 0,
            ..
        }
    ));

    register_all(&engine, &alice, &[1]);
    assert!(matches!(
        engine.registry().settle(&ctx, &alice, 9),
        Err(CoreError::InvalidToken { .. })
    ));
    assert_eq!(sink.of_kind("collapse").len(), 0);
}

#[test]
fn registration_at_or_below_watermark_fails() {
    let (engine, _sink) = make_engine();
    let alice = make_principal("acct:alice");
    register_all(&engine, &alice, &[1, 5]);
    let ctx = engine.call_as(&alice);
    engine.registry().settle(&ctx, &alice, 5).unwrap();

    for token in [0, 3, 5] {
        let err = engine
            .registry()
            .register_branch(&ctx, &alice, token, payload_ref(b"late"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidToken { last_settled: 5, .. }));
    }
    engine
        .registry()
        .register_branch(&ctx, &alice, 6, payload_ref(b"next"))
        .unwrap();
    assert_eq!(engine.registry().list_pending(&alice), vec![6]);
}

#[test]
fn re_registration_is_idempotent() {
    let (engine, sink) = make_engine();
    let alice = make_principal("acct:alice");
    let ctx = engine.call_as(&alice);

    engine
        .registry()
        .register_branch(&ctx, &alice, 4, payload_ref(b"first"))
        .unwrap();
    engine
        .registry()
        .register_branch(&ctx, &alice, 4, payload_ref(b"second"))
        .unwrap();

    assert_eq!(sink.of_kind("branch_created").len(), 1);
    let branch = engine.registry().get_branch(&alice, 4).unwrap();
    assert_eq!(branch.payload_ref, payload_ref(b"first"));
    assert_eq!(branch.state, BranchState::Pending);
    assert_eq!(branch.created_at, make_timestamp());
}

#[test]
fn actors_are_independent() {
    let (engine, _sink) = make_engine();
    let alice = make_principal("acct:alice");
    let bob = make_principal("acct:bob");
    register_all(&engine, &alice, &[1, 2]);
    register_all(&engine, &bob, &[1, 2]);

    engine
        .registry()
        .settle(&engine.call_as(&alice), &alice, 2)
        .unwrap();

    assert_eq!(engine.registry().last_settled(&bob), 0);
    assert_eq!(engine.registry().list_pending(&bob), vec![1, 2]);
    assert_eq!(engine.registry().actor_count(), 2);
}

#[test]
fn strangers_cannot_act_for_an_actor_until_authorized() {
    let (engine, _sink) = make_engine();
    let owner = make_principal("acct:owner");
    let alice = make_principal("acct:alice");
    let relayer = make_principal("acct:relayer");
    register_all(&engine, &alice, &[1]);

    let as_relayer = engine.call_as(&relayer);
    assert!(matches!(
        engine.registry().settle(&as_relayer, &alice, 1),
        Err(CoreError::NotAuthorized { .. })
    ));
    assert!(matches!(
        engine
            .registry()
            .register_branch(&as_relayer, &alice, 2, payload_ref(b"x")),
        Err(CoreError::NotAuthorized { .. })
    ));

    engine.auth().set_authorized(&owner, relayer.clone(), true).unwrap();
    engine.registry().settle(&as_relayer, &alice, 1).unwrap();

    let as_owner = engine.call_as(&owner);
    engine
        .registry()
        .register_branch(&as_owner, &alice, 3, payload_ref(b"y"))
        .unwrap();
}

#[test]
fn list_branches_reports_every_state_in_token_order() {
    let (engine, _sink) = make_engine();
    let alice = make_principal("acct:alice");
    register_all(&engine, &alice, &[3, 1, 2]);
    engine
        .registry()
        .settle(&engine.call_as(&alice), &alice, 2)
        .unwrap();

    let states: Vec<(u64, BranchState)> = engine
        .registry()
        .list_branches(&alice)
        .into_iter()
        .map(|b| (b.token, b.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (1, BranchState::Discarded),
            (2, BranchState::Settled),
            (3, BranchState::Pending),
        ]
    );
    let settled = engine.registry().get_branch(&alice, 2).unwrap();
    assert_eq!(settled.resolved_at, Some(make_timestamp()));
}

#[test]
fn concurrent_settlements_on_one_actor_leave_a_single_winner() {
    let (engine, _sink) = make_engine();
    let alice = make_principal("acct:alice");
    let tokens: Vec<u64> = (1..=32).collect();
    register_all(&engine, &alice, &tokens);

    std::thread::scope(|s| {
        for &t in &tokens {
            let engine = &engine;
            let alice = &alice;
            s.spawn(move || {
                let _ = engine.registry().settle(&engine.call_as(alice), alice, t);
            });
        }
    });

    let branches = engine.registry().list_branches(&alice);
    let settled: Vec<u64> = branches
        .iter()
        .filter(|b| b.state == BranchState::Settled)
        .map(|b| b.token)
        .collect();
    assert_eq!(engine.registry().last_settled(&alice), 32);
    assert!(settled.contains(&32));
    assert!(engine.registry().list_pending(&alice).is_empty());
    assert!(branches
        .iter()
        .all(|b| b.token == 32 || b.state != BranchState::Pending));
}
