//! End-to-end scenario tests (spec §8): one test per named scenario,
//! exercised through `Pipeline::evaluate` directly against a fresh
//! `Engine`, the same harness the `demos/` binaries use.

use controller_runtime::cache::Kind;
use controller_runtime::controller::ControllerConfig;
use controller_runtime::delta::{Delta, DeltaType};
use controller_runtime::expr::Expr;
use controller_runtime::pipeline::{AggStage, Engine, Pipeline};
use controller_runtime::target::{Target, WriteMode};
use controller_runtime::value::Value;
use serde_json::json;

fn project(template: serde_json::Value) -> AggStage {
    AggStage::Project(Expr::from_json(&template).unwrap())
}

#[test]
fn scenario_single_source_projection() {
    let pipeline = Pipeline {
        sources: vec![Kind::new("Pod")],
        join: None,
        aggregate: vec![project(json!({
            "metadata": {"name": "$.metadata.name", "namespace": "$.metadata.namespace"},
            "data": {"phase": "$.status.phase"}
        }))],
    };
    let mut engine = Engine::new();
    let input = Delta::new(
        DeltaType::Added,
        Value::from(json!({
            "metadata": {"name": "p", "namespace": "d"},
            "status": {"phase": "Running"}
        })),
    );
    let out = pipeline
        .evaluate(&mut engine, &Kind::new("Pod"), input)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].delta_type, DeltaType::Added);
    assert_eq!(
        out[0].object,
        Value::from(json!({
            "metadata": {"name": "p", "namespace": "d"},
            "data": {"phase": "Running"}
        }))
    );
}

#[test]
fn scenario_two_source_join() {
    let pipeline = Pipeline {
        sources: vec![Kind::new("ConfigMap"), Kind::new("Deployment")],
        join: Some(
            Expr::from_json(&json!({"@eq": [
                "$ConfigMap.metadata.name",
                "$Deployment.metadata.annotations[\"related-cm\"]"
            ]}))
            .unwrap(),
        ),
        aggregate: vec![project(json!({
            "metadata": {
                "name": "$Deployment.metadata.name",
                "namespace": "$Deployment.metadata.namespace"
            },
            "spec": {"template": {"metadata": {"annotations": {
                "cm-version": "$ConfigMap.resourceVersion"
            }}}}
        }))],
    };
    let mut engine = Engine::new();
    engine.view_cache.upsert(
        &Kind::new("Deployment"),
        ("x".to_string(), "d1".to_string()),
        Value::from(json!({
            "metadata": {"name": "d1", "namespace": "x"},
            "annotations": {"related-cm": "c1"}
        })),
    );
    let input = Delta::new(
        DeltaType::Added,
        Value::from(json!({
            "metadata": {"name": "c1", "namespace": "x"},
            "resourceVersion": "7"
        })),
    );
    let out = pipeline
        .evaluate(&mut engine, &Kind::new("ConfigMap"), input)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(
        out[0].object,
        Value::from(json!({
            "metadata": {"name": "d1", "namespace": "x"},
            "spec": {"template": {"metadata": {"annotations": {"cm-version": "7"}}}}
        }))
    );
}

#[test]
fn scenario_delete_fan_out_continuing_two_source_join() {
    let pipeline = Pipeline {
        sources: vec![Kind::new("ConfigMap"), Kind::new("Deployment")],
        join: Some(
            Expr::from_json(&json!({"@eq": [
                "$ConfigMap.metadata.name",
                "$Deployment.metadata.annotations[\"related-cm\"]"
            ]}))
            .unwrap(),
        ),
        aggregate: vec![project(json!({
            "metadata": {
                "name": "$Deployment.metadata.name",
                "namespace": "$Deployment.metadata.namespace"
            },
            "spec": {"template": {"metadata": {"annotations": {
                "cm-version": "$ConfigMap.resourceVersion"
            }}}}
        }))],
    };
    let mut engine = Engine::new();
    engine.view_cache.upsert(
        &Kind::new("Deployment"),
        ("x".to_string(), "d1".to_string()),
        Value::from(json!({
            "metadata": {"name": "d1", "namespace": "x"},
            "annotations": {"related-cm": "c1"}
        })),
    );
    let added = Delta::new(
        DeltaType::Added,
        Value::from(json!({
            "metadata": {"name": "c1", "namespace": "x"},
            "resourceVersion": "7"
        })),
    );
    pipeline
        .evaluate(&mut engine, &Kind::new("ConfigMap"), added)
        .unwrap();

    let removed = Delta::new(
        DeltaType::Deleted,
        Value::from(json!({"metadata": {"name": "c1", "namespace": "x"}})),
    );
    let out = pipeline
        .evaluate(&mut engine, &Kind::new("ConfigMap"), removed)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].delta_type, DeltaType::Deleted);
    assert_eq!(
        (
            out[0].object.metadata_field("namespace").unwrap(),
            out[0].object.metadata_field("name").unwrap()
        ),
        ("x", "d1")
    );
}

#[test]
fn scenario_higher_order_filter() {
    let object = Value::Null;
    let expr = Expr::from_json(&json!({"@filter": [{"@gt": ["$", 3]}, {"@list": [1, 2, 3, 4, 5]}]}))
        .unwrap();
    let result = controller_runtime::expr::eval(
        &expr,
        &controller_runtime::expr::Context::root(&object),
    )
    .unwrap();
    assert_eq!(result, Value::List(vec![Value::Int(4), Value::Int(5)]));
}

#[test]
fn scenario_select_filters_non_matching_compositions() {
    let pipeline = Pipeline {
        sources: vec![Kind::new("Pod")],
        join: None,
        aggregate: vec![
            AggStage::Select(Expr::from_json(&json!({"@eq": ["$.status.phase", "Running"]})).unwrap()),
            project(json!({"metadata": {"name": "$.metadata.name"}})),
        ],
    };
    let mut engine = Engine::new();
    let pending = Delta::new(
        DeltaType::Added,
        Value::from(json!({"metadata": {"name": "p"}, "status": {"phase": "Pending"}})),
    );
    let out = pipeline
        .evaluate(&mut engine, &Kind::new("Pod"), pending)
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn scenario_unwind_expands_a_list_field() {
    let pipeline = Pipeline {
        sources: vec![Kind::new("Bundle")],
        join: None,
        aggregate: vec![
            AggStage::Unwind(controller_runtime::path::Path::parse("$.items").unwrap()),
            project(json!({"metadata": {"name": "$.items"}})),
        ],
    };
    let mut engine = Engine::new();
    let input = Delta::new(
        DeltaType::Added,
        Value::from(json!({"metadata": {"name": "bundle"}, "items": ["a", "b", "c"]})),
    );
    let out = pipeline
        .evaluate(&mut engine, &Kind::new("Bundle"), input)
        .unwrap();
    assert_eq!(out.len(), 3);
    let names: Vec<&str> = out.iter().map(|d| d.object.metadata_field("name").unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn scenario_label_selector_match() {
    let expr = Expr::from_json(&json!({"@selector": [
        {"matchLabels": {"env": "prod"}, "matchExpressions": [
            {"key": "tier", "operator": "In", "values": ["web", "api"]}
        ]},
        {"env": "prod", "tier": "web"}
    ]}))
    .unwrap();
    let object = Value::Null;
    let result = controller_runtime::expr::eval(&expr, &controller_runtime::expr::Context::root(&object)).unwrap();
    assert_eq!(result, Value::Bool(true));
}

#[test]
fn scenario_empty_source_fault_rejects_multi_source_without_join() {
    let config = ControllerConfig {
        sources: vec![Kind::new("ConfigMap"), Kind::new("Deployment")],
        pipeline: Pipeline {
            sources: vec![Kind::new("ConfigMap"), Kind::new("Deployment")],
            join: None,
            aggregate: vec![],
        },
        target: Target {
            kind: Kind::new("Deployment"),
            mode: WriteMode::Patcher,
        },
    };
    assert!(config.validate().is_err());
}
