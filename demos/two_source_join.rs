//! Joins `ConfigMap` and `Deployment` on an annotation reference, then
//! projects the configmap's `resourceVersion` onto the deployment's
//! template annotations — the shape a "restart on config change" style
//! controller would use.

use controller_runtime::cache::Kind;
use controller_runtime::delta::{Delta, DeltaType};
use controller_runtime::expr::Expr;
use controller_runtime::pipeline::{AggStage, Engine, Pipeline};
use controller_runtime::value::Value;
use serde_json::json;

fn main() {
    tracing_subscriber::fmt::init();

    let pipeline = Pipeline {
        sources: vec![Kind::new("ConfigMap"), Kind::new("Deployment")],
        join: Some(
            Expr::from_json(&json!({"@eq": [
                "$ConfigMap.metadata.name",
                "$Deployment.metadata.annotations[\"related-cm\"]"
            ]}))
            .expect("condition is valid"),
        ),
        aggregate: vec![AggStage::Project(
            Expr::from_json(&json!({
                "metadata": {
                    "name": "$Deployment.metadata.name",
                    "namespace": "$Deployment.metadata.namespace"
                },
                "spec": {"template": {"metadata": {"annotations": {
                    "cm-version": "$ConfigMap.resourceVersion"
                }}}}
            }))
            .expect("template is valid"),
        )],
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

    let outputs = pipeline
        .evaluate(&mut engine, &Kind::new("ConfigMap"), input)
        .expect("pipeline evaluates");

    for delta in outputs {
        println!("{:?} -> {}", delta.delta_type, delta.object);
    }
}
