use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use strand_canonical::{payload_ref, PrincipalId};
use strand_core::{BranchState, EngineConfig, NoopSink, SettlementEngine};

fn make_engine() -> SettlementEngine {
    SettlementEngine::new(
        EngineConfig {
            shard_count: 4,
            ..EngineConfig::default()
        },
        PrincipalId::parse("acct:owner").unwrap(),
        Arc::new(NoopSink),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Register(u64),
    Settle(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..40).prop_map(Op::Register),
        (1u64..40).prop_map(Op::Settle),
    ]
}

proptest! {
    #[test]
    fn watermark_never_decreases_and_terminal_states_stick(ops in prop::collection::vec(op(), 1..60)) {
        let engine = make_engine();
        let alice = PrincipalId::parse("acct:alice").unwrap();
        let ctx = engine.call_as(&alice);
        let reg = engine.registry();

        let mut last = 0u64;
        let mut terminal: Vec<(u64, BranchState)> = Vec::new();
        for op in ops {
            match op {
                Op::Register(t) => {
                    let accepted = reg.register_branch(&ctx, &alice, t, payload_ref(&t.to_be_bytes())).is_ok();
                    prop_assert_eq!(accepted, t > last);
                }
                Op::Settle(t) => {
                    if let Ok(discarded) = reg.settle(&ctx, &alice, t) {
                        prop_assert!(t > last);
                        prop_assert!(discarded.iter().all(|d| *d < t));
                        terminal.push((t, BranchState::Settled));
                        terminal.extend(discarded.into_iter().map(|d| (d, BranchState::Discarded)));
                    }
                }
            }
            let now = reg.last_settled(&alice);
            prop_assert!(now >= last);
            last = now;

            for (t, state) in &terminal {
                prop_assert_eq!(reg.branch_state(&alice, *t), Some(*state));
            }
            prop_assert!(reg.list_pending(&alice).iter().all(|t| *t > last));
        }
    }

    #[test]
    fn batch_settle_equals_sequential(
        tokens in prop::collection::btree_set(1u64..30, 1..12),
        picks in prop::collection::vec(1u64..30, 1..10),
    ) {
        let alice = PrincipalId::parse("acct:alice").unwrap();
        let owner = PrincipalId::parse("acct:owner").unwrap();
        let registered: BTreeSet<u64> = tokens;
        // Fresh unknown tokens abort a batch, so only pick registered ones.
        let pairs: Vec<_> = picks
            .into_iter()
            .filter(|t| registered.contains(t))
            .map(|t| (alice.clone(), t))
            .collect();
        prop_assume!(!pairs.is_empty());

        let batched = make_engine();
        let sequential = make_engine();
        for engine in [&batched, &sequential] {
            let ctx = engine.call_as(&alice);
            for t in &registered {
                engine.registry().register_branch(&ctx, &alice, *t, payload_ref(&t.to_be_bytes())).unwrap();
            }
        }

        let report = batched.batches().batch_settle(&batched.call_as(&owner), &pairs).unwrap();
        prop_assert_eq!(report.count, pairs.len());
        for (actor, t) in &pairs {
            let _ = sequential.registry().settle(&sequential.call_as(&owner), actor, *t);
        }

        let a: Vec<_> = batched.registry().list_branches(&alice).into_iter().map(|b| (b.token, b.state)).collect();
        let b: Vec<_> = sequential.registry().list_branches(&alice).into_iter().map(|b| (b.token, b.state)).collect();
        prop_assert_eq!(a, b);
    }
}
