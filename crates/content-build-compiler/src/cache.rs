//! Owns and lifecycle-manages [`Worker`]s; routes build requests by
//! resource type; emits per-file lifecycle events. `spec.md` §4.7.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ipc::{BuildRequest, Message, VersionQuery};
use crate::pipeline::PipelineDefinition;
use crate::worker::{Worker, WorkerEvent, WorkerState};

/// One build submission, as described by `spec.md` §4.7's `build(targetPath, input)`.
#[derive(Debug, Clone)]
pub struct BuildInput {
    pub bundle: String,
    pub target: String,
    pub source_path: String,
    pub target_path: String,
    pub resource_name: String,
    pub resource_type: String,
    pub platform: String,
}

/// Result of a build submission, paired back with its originating input.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub input: BuildInput,
    pub success: bool,
    pub errors: Vec<String>,
    pub outputs: Vec<String>,
    pub references: Vec<String>,
    /// The worker's `VERSION_DATA` reply, recorded at the time this
    /// result came back so callers can stamp it onto a `TargetEntry`.
    /// Absent only for a crash outcome synthesized before any worker
    /// ever reported a version.
    pub compiler_version: Option<i64>,
}

/// Events emitted by the cache's dispatch loop, per `spec.md` §4.7.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// All workers have returned `VERSION_DATA`.
    Ready,
    /// A `BUILD_REQUEST` was sent to a worker.
    Started { input: BuildInput },
    /// No worker exists for the request's resource type; never queued.
    Skipped { input: BuildInput, reason: String },
    /// A worker returned a `BUILD_RESULT` (possibly synthesized after a crash).
    Complete { outcome: BuildOutcome },
    /// All workers have been told to exit and have been reaped.
    Terminated,
}

enum Command {
    Build(BuildInput),
    Shutdown,
}

/// Handle used by the `Builder` to submit work and shut the cache down.
/// Cheaply cloneable; the actual worker state lives in a background task.
#[derive(Clone)]
pub struct CompilerCache {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl CompilerCache {
    /// Spawns one worker per entry in `pipeline`, wires up their reader
    /// tasks, and starts the dispatch loop as a background task.
    ///
    /// Returns the cache handle plus the receiving end of its event
    /// stream; the caller (the `Builder`) drives its own loop around
    /// `events.recv()`.
    pub async fn new(
        processor_root: &Path,
        pipeline: PipelineDefinition,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CacheEvent>)> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cache_events_tx, cache_events_rx) = mpsc::unbounded_channel();
        let (worker_events_tx, worker_events_rx) = mpsc::unbounded_channel();

        let mut workers = HashMap::new();
        for (resource_type, def) in pipeline.iter() {
            let worker = Worker::spawn(
                resource_type,
                def.clone(),
                processor_root,
                worker_events_tx.clone(),
            )?;
            workers.insert(resource_type.clone(), worker);
        }

        for worker in workers.values_mut() {
            worker.send(&Message::VersionQuery(VersionQuery {})).await?;
        }

        tokio::spawn(dispatch_loop(
            workers,
            command_rx,
            worker_events_rx,
            worker_events_tx,
            cache_events_tx,
        ));

        Ok((Self { command_tx }, cache_events_rx))
    }

    /// Submits a build. If no worker is registered for the resource
    /// type, a `Skipped` event is emitted and the request is dropped;
    /// otherwise it is queued and dispatched in FIFO order.
    pub fn build(&self, input: BuildInput) {
        let _ = self.command_tx.send(Command::Build(input));
    }

    /// Sends a termination signal to every worker and awaits their
    /// orderly exit, force-killing any survivor.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

async fn dispatch_loop(
    mut workers: HashMap<String, Worker>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    mut worker_events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    worker_events_tx: mpsc::UnboundedSender<WorkerEvent>,
    cache_events_tx: mpsc::UnboundedSender<CacheEvent>,
) {
    let total_workers = workers.len();
    let mut ready_count = 0_usize;
    let mut ready_emitted = total_workers == 0;
    if ready_emitted {
        let _ = cache_events_tx.send(CacheEvent::Ready);
    }

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(Command::Build(input)) => {
                        handle_build(&mut workers, input, &cache_events_tx).await;
                    }
                    Some(Command::Shutdown) => {
                        for worker in workers.values_mut() {
                            worker.shutdown().await;
                        }
                        let _ = cache_events_tx.send(CacheEvent::Terminated);
                        return;
                    }
                    None => return,
                }
            }
            event = worker_events_rx.recv() => {
                match event {
                    Some(WorkerEvent::Message(resource_type, Message::VersionData(data))) => {
                        if let Some(worker) = workers.get_mut(&resource_type) {
                            worker.version = Some(data.version);
                            if worker.state == WorkerState::Spawning {
                                worker.state = WorkerState::Idle;
                                ready_count += 1;
                                dispatch_next(worker, &cache_events_tx).await;
                            }
                            if !ready_emitted && ready_count == total_workers {
                                ready_emitted = true;
                                let _ = cache_events_tx.send(CacheEvent::Ready);
                            }
                        }
                    }
                    Some(WorkerEvent::Message(resource_type, Message::BuildResult(result))) => {
                        if let Some(worker) = workers.get_mut(&resource_type) {
                            if let Some(input) = worker.in_flight.take() {
                                let outcome = BuildOutcome {
                                    input,
                                    success: result.success,
                                    errors: result.errors,
                                    outputs: result.outputs,
                                    references: result.references,
                                    compiler_version: worker.version,
                                };
                                let _ = cache_events_tx.send(CacheEvent::Complete { outcome });
                            }
                            worker.state = WorkerState::Idle;
                            dispatch_next(worker, &cache_events_tx).await;
                        }
                    }
                    Some(WorkerEvent::Message(_, Message::VersionQuery(_) | Message::BuildRequest(_))) => {
                        warn!("worker sent a message reserved for the cache; ignoring");
                    }
                    Some(WorkerEvent::Exited(resource_type)) => {
                        if let Some(worker) = workers.get_mut(&resource_type) {
                            if worker.state == WorkerState::Terminating
                                || worker.state == WorkerState::Dead
                            {
                                continue;
                            }
                            if let Some(input) = worker.in_flight.take() {
                                let outcome = BuildOutcome {
                                    input,
                                    success: false,
                                    errors: vec![format!(
                                        "compiler worker for resource type '{resource_type}' crashed"
                                    )],
                                    outputs: vec![],
                                    references: vec![],
                                    compiler_version: worker.version,
                                };
                                let _ = cache_events_tx.send(CacheEvent::Complete { outcome });
                            }
                            info!(resource_type = %resource_type, "compiler worker exited, restarting");
                            if worker.respawn(worker_events_tx.clone()).is_ok() {
                                let _ = worker
                                    .send(&Message::VersionQuery(VersionQuery {}))
                                    .await;
                            }
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

async fn handle_build(
    workers: &mut HashMap<String, Worker>,
    input: BuildInput,
    cache_events_tx: &mpsc::UnboundedSender<CacheEvent>,
) {
    let Some(worker) = workers.get_mut(&input.resource_type) else {
        let _ = cache_events_tx.send(CacheEvent::Skipped {
            reason: "no compiler for resource type".to_owned(),
            input,
        });
        return;
    };

    worker.queue.push_back(input);
    if worker.state == WorkerState::Idle {
        dispatch_next(worker, cache_events_tx).await;
    }
}

async fn dispatch_next(worker: &mut Worker, cache_events_tx: &mpsc::UnboundedSender<CacheEvent>) {
    if worker.state != WorkerState::Idle {
        return;
    }
    let Some(input) = worker.queue.pop_front() else {
        return;
    };

    let request = Message::BuildRequest(BuildRequest {
        source_path: input.source_path.clone(),
        target_path: input.target_path.clone(),
        platform: input.platform.clone(),
    });

    if worker.send(&request).await.is_err() {
        // Treated the same as a mid-flight crash: surface a failure and
        // leave the worker to be respawned by the next `Exited` event.
        let version = worker.version;
        let _ = cache_events_tx.send(CacheEvent::Complete {
            outcome: BuildOutcome {
                input,
                success: false,
                errors: vec!["failed to send build request to worker".to_owned()],
                outputs: vec![],
                references: vec![],
                compiler_version: version,
            },
        });
        return;
    }

    worker.state = WorkerState::Busy;
    debug!(source_path = %input.source_path, "dispatched build request");
    worker.in_flight = Some(input.clone());
    let _ = cache_events_tx.send(CacheEvent::Started { input });
}
