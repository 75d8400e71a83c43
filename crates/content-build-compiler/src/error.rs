use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the compiler cache and its workers.
///
/// These map onto the error kinds of `spec.md` §7: `NoCompiler` and
/// `PlatformMismatch`-adjacent conditions are non-fatal and surfaced as
/// `skipped`/`complete` events rather than as a `Result::Err`; the
/// variants here are the ones that abort the operation that raised them.
#[derive(Error, Debug)]
pub enum Error {
    /// Pipeline definition file could not be read.
    #[error("failed to read pipeline definition at '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    /// Pipeline definition file was not valid JSON.
    #[error("malformed pipeline definition at '{0}'")]
    Format(PathBuf, #[source] serde_json::Error),

    /// No compiler is registered for the given resource type.
    #[error("no compiler for resource type '{0}'")]
    NoCompiler(String),

    /// Failed to spawn the worker process.
    #[error("failed to spawn compiler worker '{0}'")]
    Spawn(String, #[source] std::io::Error),

    /// The worker process exited or its output could not be parsed.
    #[error("compiler worker '{0}' crashed")]
    WorkerCrash(String),

    /// A message on the wire did not match the expected tag or shape.
    #[error("ipc protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, Error>;
