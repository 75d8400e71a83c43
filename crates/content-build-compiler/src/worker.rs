//! A single long-lived data compiler subprocess.
//!
//! One [`Worker`] is spawned per resource type named in the pipeline
//! definition (`spec.md` §4.6/§4.7). It owns the child process, a
//! writer half for sending [`Message`]s, and a background task that
//! reads newline-delimited JSON responses from the child's stdout and
//! forwards them to the [`super::cache::CompilerCache`] dispatch loop.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::ipc::Message;
use crate::pipeline::CompilerDef;
use crate::cache::BuildInput;

/// Lifecycle state of a [`Worker`], per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Spawning,
    Idle,
    Busy,
    Terminating,
    Dead,
}

/// Event produced by a worker's reader/exit-watcher tasks, destined for
/// the cache's dispatch loop. Tagged with the resource type so the
/// dispatch loop can route it back to the originating [`Worker`].
#[derive(Debug)]
pub enum WorkerEvent {
    Message(String, Message),
    Exited(String),
}

/// One resource type's long-lived compiler subprocess.
pub struct Worker {
    pub resource_type: String,
    pub def: CompilerDef,
    pub state: WorkerState,
    pub version: Option<i64>,
    pub queue: VecDeque<BuildInput>,
    pub in_flight: Option<BuildInput>,
    child: Child,
    stdin: Option<ChildStdin>,
    processor_root: PathBuf,
}

impl Worker {
    /// Spawns the worker's child process and starts its reader/exit
    /// tasks, forwarding decoded events to `events_tx`.
    pub fn spawn(
        resource_type: &str,
        def: CompilerDef,
        processor_root: &Path,
        events_tx: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<Self> {
        let (child, stdin) = Self::spawn_child(&def, processor_root, resource_type, &events_tx)?;

        Ok(Self {
            resource_type: resource_type.to_owned(),
            def,
            state: WorkerState::Spawning,
            version: None,
            queue: VecDeque::new(),
            in_flight: None,
            child,
            stdin: Some(stdin),
            processor_root: processor_root.to_owned(),
        })
    }

    fn spawn_child(
        def: &CompilerDef,
        processor_root: &Path,
        resource_type: &str,
        events_tx: &mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<(Child, ChildStdin)> {
        let exe_path = processor_root.join(&def.executable);
        let mut command = Command::new(&exe_path);
        command
            .args(&def.args)
            .arg("--persistent")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .map_err(|e| Error::Spawn(def.executable.clone(), e))?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let reader_tx = events_tx.clone();
        let reader_resource_type = resource_type.to_owned();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Message::decode_line(&line) {
                            Ok(message) => {
                                if reader_tx
                                    .send(WorkerEvent::Message(reader_resource_type.clone(), message))
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(_) => {
                                // Unparsable output is treated the same as a crash.
                                let _ = reader_tx
                                    .send(WorkerEvent::Exited(reader_resource_type.clone()));
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        let _ = reader_tx.send(WorkerEvent::Exited(reader_resource_type.clone()));
                        break;
                    }
                    Err(_) => {
                        let _ = reader_tx.send(WorkerEvent::Exited(reader_resource_type.clone()));
                        break;
                    }
                }
            }
        });

        Ok((child, stdin))
    }

    /// Restarts a crashed or terminated worker in place, preserving its
    /// pending queue.
    pub fn respawn(&mut self, events_tx: mpsc::UnboundedSender<WorkerEvent>) -> Result<()> {
        let (child, stdin) =
            Self::spawn_child(&self.def, &self.processor_root, &self.resource_type, &events_tx)?;
        self.child = child;
        self.stdin = Some(stdin);
        self.state = WorkerState::Spawning;
        self.version = None;
        Ok(())
    }

    /// Writes a message to the worker's stdin.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::WorkerCrash(self.resource_type.clone()))?;
        let line = message.encode_line()?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|_e| Error::WorkerCrash(self.resource_type.clone()))?;
        stdin
            .flush()
            .await
            .map_err(|_e| Error::WorkerCrash(self.resource_type.clone()))
    }

    /// Closes stdin and waits briefly for an orderly exit, force-killing
    /// the child if it does not exit in time.
    pub async fn shutdown(&mut self) {
        self.state = WorkerState::Terminating;
        self.stdin.take();

        let grace = tokio::time::Duration::from_secs(2);
        let exited = tokio::time::timeout(grace, self.child.wait()).await;
        if exited.is_err() {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
        self.state = WorkerState::Dead;
    }
}
