//! Runs a controller end-to-end against an in-memory writer: submits a
//! handful of watch events through the bounded request channel and prints
//! what lands in the target.

use controller_runtime::cache::{Kind, ViewCache};
use controller_runtime::controller::{spawn, ControllerConfig, Request, WatchEvent};
use controller_runtime::expr::Expr;
use controller_runtime::pipeline::{AggStage, Pipeline};
use controller_runtime::target::{InMemoryWriter, Target, WriteMode};
use controller_runtime::value::Value;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ControllerConfig {
        sources: vec![Kind::new("Pod")],
        pipeline: Pipeline {
            sources: vec![Kind::new("Pod")],
            join: None,
            aggregate: vec![AggStage::Project(
                Expr::from_json(&json!({
                    "metadata": {"name": "$.metadata.name"},
                    "data": {"phase": "$.status.phase"}
                }))
                .expect("template is valid"),
            )],
        },
        target: Target {
            kind: Kind::new("Pod"),
            mode: WriteMode::Updater,
        },
    };

    let writer = Arc::new(InMemoryWriter::new());
    let object_cache = Arc::new(parking_lot::RwLock::new(ViewCache::new()));
    let (handle, mut status) = spawn(config, Arc::clone(&writer), Arc::clone(&object_cache), 1024);

    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let state = status.borrow();
            if let Some(top) = state.top() {
                eprintln!("controller status: critical={} top={}", state.critical, top.message);
            }
        }
    });

    let p1 = (String::new(), "p1".to_string());
    object_cache.write().upsert(
        &Kind::new("Pod"),
        p1.clone(),
        Value::from(json!({
            "metadata": {"name": "p1"},
            "status": {"phase": "Pending"}
        })),
    );
    handle
        .submit(Request {
            source_kind: Kind::new("Pod"),
            identity: p1.clone(),
            event: WatchEvent::Added,
        })
        .await
        .expect("channel accepts request");

    object_cache.write().upsert(
        &Kind::new("Pod"),
        p1.clone(),
        Value::from(json!({
            "metadata": {"name": "p1"},
            "status": {"phase": "Running"}
        })),
    );
    handle
        .submit(Request {
            source_kind: Kind::new("Pod"),
            identity: p1,
            event: WatchEvent::Updated,
        })
        .await
        .expect("channel accepts request");

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "p1 projected as: {:?}",
        writer.get(&Kind::new("Pod"), "", "p1")
    );

    handle.cancel();
}
