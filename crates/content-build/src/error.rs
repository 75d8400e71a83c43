use std::path::PathBuf;

use thiserror::Error;

/// Data build error.
///
/// Mirrors the error kinds of `spec.md` §7. Failures of a single file
/// never surface here — they are reported through the event stream as
/// `FileError` and folded into a package's `error_count`. Only failures
/// that make a package or project impossible to proceed with (a
/// database that cannot be loaded, a pipeline that cannot be parsed) are
/// represented as this `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem read/write/stat failure.
    #[error("io error at '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    /// A source or target database file was not valid JSON.
    #[error("malformed database at '{0}'")]
    Format(PathBuf, #[source] serde_json::Error),

    /// The pipeline definition could not be parsed.
    #[error("pipeline error")]
    Pipeline(#[from] content_build_compiler::Error),

    /// A requested package does not exist and could not be created.
    #[error("package '{0}' not found")]
    PackageNotFound(String),

    /// A path could not be made relative to a package/target root.
    #[error("path '{0}' is not under root '{1}'")]
    NotUnderRoot(PathBuf, PathBuf),

    /// A project-level invariant the Builder relies on did not hold, e.g.
    /// the compiler cache's first event was not `ready`.
    #[error("build error: {0}")]
    Build(String),
}

pub type Result<T> = std::result::Result<T, Error>;
