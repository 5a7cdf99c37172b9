//! Projects a `Pod`'s status phase into a small derived document, without
//! any join stage — the simplest pipeline shape.

use controller_runtime::cache::Kind;
use controller_runtime::delta::{Delta, DeltaType};
use controller_runtime::expr::Expr;
use controller_runtime::pipeline::{AggStage, Engine, Pipeline};
use controller_runtime::value::Value;
use serde_json::json;

fn main() {
    tracing_subscriber::fmt::init();

    let pipeline = Pipeline {
        sources: vec![Kind::new("Pod")],
        join: None,
        aggregate: vec![AggStage::Project(
            Expr::from_json(&json!({
                "metadata": {
                    "name": "$.metadata.name",
                    "namespace": "$.metadata.namespace"
                },
                "data": {"phase": "$.status.phase"}
            }))
            .expect("template is valid"),
        )],
    };

    let mut engine = Engine::new();
    let input = Delta::new(
        DeltaType::Added,
        Value::from(json!({
            "metadata": {"name": "p", "namespace": "d"},
            "status": {"phase": "Running"}
        })),
    );

    let outputs = pipeline
        .evaluate(&mut engine, &Kind::new("Pod"), input)
        .expect("pipeline evaluates");

    for delta in outputs {
        println!("{:?} -> {}", delta.delta_type, delta.object);
    }
}
