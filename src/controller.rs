//! # Controller loop
//!
//! One bounded request channel per controller, drained FIFO by a single
//! worker task (spec §4.5). The producer side (watch-event handlers) sends
//! requests; a full channel makes `send().await` block, which is the
//! backpressure mechanism — there is no separate queue depth check. All
//! state (view cache, emitted-view cache, error reporter) is confined to
//! the worker task, the same ownership shape as the teacher's
//! command-channel-to-worker-thread engine, ported to `tokio::task` instead
//! of a dedicated OS thread.

use crate::cache::{CacheError, Kind, ObjectCache, ObjectKey};
use crate::delta::{Delta, DeltaType};
use crate::pipeline::{Engine, Pipeline, PipelineError};
use crate::reporter::{Reporter, ReporterState};
use crate::target::{Target, TargetError, Writer};
use crate::value::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller config invalid: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One watch event destined for the controller's pipeline: an identity plus
/// the kind of change. The object body itself is not carried here — step 1
/// of `processRequest` (spec §4.5) fetches it from the `ObjectCache`, the
/// same collaborator interface a real informer cache exposes (spec §6).
#[derive(Debug, Clone)]
pub struct Request {
    pub source_kind: Kind,
    pub identity: ObjectKey,
    pub event: WatchEvent,
}

/// The kind of change a watch event reports. Mirrors [`DeltaType`] exactly;
/// kept as its own type because the watch-event and delta vocabularies are
/// conceptually distinct seams (spec §3 vs §4.5) even though their shapes
/// coincide today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    Added,
    Updated,
    Replaced,
    Deleted,
    Sync,
}

impl WatchEvent {
    fn delta_type(self) -> DeltaType {
        match self {
            WatchEvent::Added => DeltaType::Added,
            WatchEvent::Updated => DeltaType::Updated,
            WatchEvent::Replaced => DeltaType::Replaced,
            WatchEvent::Deleted => DeltaType::Deleted,
            WatchEvent::Sync => DeltaType::Sync,
        }
    }
}

/// Build the identity-only document a `Deleted` delta carries — no fetch is
/// possible once the object is gone, so the tombstone is built straight
/// from the watch event's identity (spec §4.5 step 1).
fn tombstone(identity: &ObjectKey) -> Value {
    Value::Map(
        [(
            "metadata".to_string(),
            Value::Map(
                [
                    ("namespace".to_string(), Value::String(identity.0.clone())),
                    ("name".to_string(), Value::String(identity.1.clone())),
                ]
                .into(),
            ),
        )]
        .into(),
    )
}

/// `{sources, pipeline, target}` plus the construction-time invariants
/// (spec §3): `sources` non-empty, `target` non-empty (checked by its
/// presence as a field, non-`Option`), and — if more than one source — the
/// pipeline must contain a `@join`.
pub struct ControllerConfig {
    pub sources: Vec<Kind>,
    pub pipeline: Pipeline,
    pub target: Target,
}

impl ControllerConfig {
    pub fn validate(self) -> Result<Self, ControllerError> {
        if self.sources.is_empty() {
            return Err(ControllerError::InvalidConfig("sources must be non-empty"));
        }
        if self.sources.len() > 1 && self.pipeline.join.is_none() {
            return Err(ControllerError::InvalidConfig(
                "a multi-source pipeline requires a @join stage",
            ));
        }
        Ok(self)
    }
}

/// Handle to a running controller: the sending half of its request
/// channel, plus the cancellation token that stops its worker.
pub struct ControllerHandle {
    sender: mpsc::Sender<Request>,
    cancellation: CancellationToken,
}

impl ControllerHandle {
    /// Submit a request. Blocks if the channel is full (backpressure,
    /// spec §4.5/§5).
    pub async fn submit(&self, request: Request) -> Result<(), mpsc::error::SendError<Request>> {
        self.sender.send(request).await
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Spawn a controller's worker task. Returns a handle to submit requests
/// and a watch receiver for the error reporter's published state.
pub fn spawn<W, C>(
    config: ControllerConfig,
    writer: Arc<W>,
    object_cache: Arc<C>,
    channel_capacity: usize,
) -> (ControllerHandle, watch::Receiver<ReporterState>)
where
    W: Writer + 'static,
    C: ObjectCache + 'static,
{
    let config = match config.validate() {
        Ok(config) => config,
        Err(err) => panic!("{err}"),
    };
    let (tx, rx) = mpsc::channel(channel_capacity);
    let cancellation = CancellationToken::new();
    let (reporter, status_rx) = Reporter::new();

    let worker_cancellation = cancellation.clone();
    tokio::spawn(run_worker(
        config,
        writer,
        object_cache,
        rx,
        reporter,
        worker_cancellation,
    ));

    (
        ControllerHandle {
            sender: tx,
            cancellation,
        },
        status_rx,
    )
}

async fn run_worker<W, C>(
    config: ControllerConfig,
    writer: Arc<W>,
    object_cache: Arc<C>,
    mut rx: mpsc::Receiver<Request>,
    mut reporter: Reporter,
    cancellation: CancellationToken,
) where
    W: Writer + 'static,
    C: ObjectCache + 'static,
{
    let mut engine = Engine::new();
    loop {
        let request = tokio::select! {
            biased;
            () = cancellation.cancelled() => break,
            request = rx.recv() => request,
        };
        let Some(request) = request else { break };

        if let Err(err) = process_request(
            &config.pipeline,
            &mut engine,
            &config.target,
            writer.as_ref(),
            object_cache.as_ref(),
            request,
        )
        .await
        {
            warn!(error = %err, "controller request failed");
            reporter.report(err.to_string());
        }
    }
    info!("controller worker exiting");
}

/// Steps 1-4 of spec §4.5: fetch the object (unless the event is `Deleted`,
/// which builds a tombstone from identity instead), build the delta,
/// evaluate the pipeline, write every output delta. A cache miss (spec §7
/// error kind 3) is transient: the request is dropped with a warning rather
/// than propagated as an error. A write failure is reported but does not
/// abort the remaining writes.
#[instrument(skip(pipeline, engine, target, writer, object_cache, request), fields(kind = %request.source_kind))]
async fn process_request<W, C>(
    pipeline: &Pipeline,
    engine: &mut Engine,
    target: &Target,
    writer: &W,
    object_cache: &C,
    request: Request,
) -> Result<(), ControllerError>
where
    W: Writer + ?Sized,
    C: ObjectCache + ?Sized,
{
    let source_kind = request.source_kind.clone();
    let object = if request.event == WatchEvent::Deleted {
        tombstone(&request.identity)
    } else {
        match object_cache.get(&source_kind, &request.identity).await? {
            Some(object) => object,
            None => {
                warn!(
                    kind = %source_kind,
                    namespace = %request.identity.0,
                    name = %request.identity.1,
                    "object cache miss, dropping request"
                );
                return Ok(());
            }
        }
    };

    let delta = Delta::new(request.event.delta_type(), object);
    let out_deltas = pipeline.evaluate(engine, &source_kind, delta)?;

    for out_delta in out_deltas {
        if let Err(err) = writer.write(target, &out_delta).await {
            report_write_failure(&err);
        }
    }
    Ok(())
}

fn report_write_failure(err: &TargetError) {
    warn!(error = %err, "target write failed");
}
