//! Property tests for the invariants in spec §8 (P1, P3, P5, P6). P2 and
//! P4 are simple enough to state as plain assertions and are covered
//! alongside the scenario tests in `scenarios.rs`.

use controller_runtime::cache::{Kind, ViewCache};
use controller_runtime::delta::{Delta, DeltaType};
use controller_runtime::expr::{self, Context, Expr};
use controller_runtime::pipeline::{AggStage, Engine, Pipeline};
use controller_runtime::value::Value;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

fn arb_json_leaf() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i32>().prop_map(|i| json!(i)),
        "[a-z]{0,6}".prop_map(serde_json::Value::String),
    ]
}

fn arb_json(depth: u32) -> impl Strategy<Value = serde_json::Value> {
    let leaf = arb_json_leaf();
    if depth == 0 {
        leaf.boxed()
    } else {
        leaf.prop_recursive(depth, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
        .boxed()
    }
}

/// P1 (round-trip): re-parsing an expression's serialized form yields an
/// expression that evaluates identically on every context it's tried
/// against here.
proptest! {
    #[test]
    fn p1_expression_round_trip_preserves_evaluation(json in arb_json(3)) {
        let Ok(expr) = Expr::from_json(&json) else { return Ok(()); };
        let reparsed = Expr::from_json(&expr.to_json()).expect("re-serialized form parses");

        let object = Value::Null;
        let ctx = Context::root(&object);
        let original = expr::eval(&expr, &ctx);
        let round_tripped = expr::eval(&reparsed, &ctx);
        match (original, round_tripped) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            (a, b) => prop_assert!(false, "divergent: {:?} vs {:?}", a, b),
        }
    }
}

/// P6 (expression purity): the same expression against the same context
/// yields bit-identical results across repeated evaluations.
proptest! {
    #[test]
    fn p6_expression_evaluation_is_pure(json in arb_json(3)) {
        let Ok(expr) = Expr::from_json(&json) else { return Ok(()); };
        let object = Value::Null;
        let ctx = Context::root(&object);
        let first = expr::eval(&expr, &ctx);
        let second = expr::eval(&expr, &ctx);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            (a, b) => prop_assert!(false, "non-deterministic: {:?} vs {:?}", a, b),
        }
    }
}

/// P5 (idempotence of Upsert): upserting the same object twice leaves the
/// cache identical to a single upsert.
proptest! {
    #[test]
    fn p5_upsert_is_idempotent(name in "[a-z]{1,8}", data in arb_json(2)) {
        let kind = Kind::new("Widget");
        let key = (String::new(), name.clone());
        let object: Value = data.into();

        let mut once = ViewCache::new();
        once.upsert(&kind, key.clone(), object.clone());

        let mut twice = ViewCache::new();
        twice.upsert(&kind, key.clone(), object.clone());
        twice.upsert(&kind, key.clone(), object.clone());

        prop_assert_eq!(once.get(&kind, &key), twice.get(&kind, &key));
        prop_assert_eq!(once.len(&kind), twice.len(&kind));
    }
}

#[derive(Debug, Clone)]
enum Op {
    Upsert(usize, String),
    Delete(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = (0usize..4, "[a-z]{1,4}").prop_flat_map(|(id, phase)| {
        prop_oneof![
            Just(Op::Upsert(id, phase.clone())),
            Just(Op::Delete(id)),
        ]
    });
    prop::collection::vec(op, 0..20)
}

fn projecting_pipeline() -> Pipeline {
    Pipeline {
        sources: vec![Kind::new("Pod")],
        join: None,
        aggregate: vec![AggStage::Project(
            Expr::from_json(&json!({
                "metadata": {"name": "$.metadata.name"},
                "data": {"phase": "$.status.phase"}
            }))
            .unwrap(),
        )],
    }
}

fn pod_object(id: usize, phase: &str) -> Value {
    Value::from(json!({
        "metadata": {"name": format!("pod-{id}")},
        "status": {"phase": phase}
    }))
}

/// P3 (delta conservation): applying the incremental output deltas onto a
/// materialized view reaches the same state as evaluating the pipeline
/// fresh over the final base state.
proptest! {
    #[test]
    fn p3_incremental_deltas_conserve_full_evaluation(ops in arb_ops()) {
        let pipeline = projecting_pipeline();
        let mut engine = Engine::new();
        let mut materialized: BTreeMap<(String, String), Value> = BTreeMap::new();

        for op in &ops {
            let delta = match op {
                Op::Upsert(id, phase) => Delta::new(DeltaType::Updated, pod_object(*id, phase)),
                Op::Delete(id) => Delta::new(DeltaType::Deleted, pod_object(*id, "")),
            };
            let outputs = pipeline
                .evaluate(&mut engine, &Kind::new("Pod"), delta)
                .expect("projection pipeline never errors on this input shape");
            for out in outputs {
                let key = out.identity();
                match out.delta_type {
                    DeltaType::Deleted => { materialized.remove(&key); }
                    _ => { materialized.insert(key, out.object); }
                }
            }
        }

        // Full evaluation: re-run every currently-cached base object as a
        // Sync delta against a fresh engine and collect the projections.
        let mut fresh_engine = Engine::new();
        let mut expected: BTreeMap<(String, String), Value> = BTreeMap::new();
        for key in engine.view_cache.list_keys(&Kind::new("Pod")) {
            let object = engine.view_cache.get(&Kind::new("Pod"), key).unwrap().clone();
            let outputs = pipeline
                .evaluate(&mut fresh_engine, &Kind::new("Pod"), Delta::new(DeltaType::Sync, object))
                .unwrap();
            for out in outputs {
                expected.insert(out.identity(), out.object);
            }
        }

        prop_assert_eq!(materialized, expected);
    }
}
