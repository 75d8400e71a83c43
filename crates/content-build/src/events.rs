//! Build lifecycle events, `spec.md` §4.9/§5.
//!
//! An explicit observer trait rather than a channel: the `Builder` and its
//! subscriber (currently only the CLI front end) live in the same process,
//! so there is no need to decouple them across an async boundary the way
//! `content_build_compiler::CompilerCache` decouples itself from workers
//! living in other processes (see `spec.md` §9 "Event emitter pattern").

/// One lifecycle event raised during a project build.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    /// All compiler workers have reported their version; packages begin.
    Ready,
    /// A package's source walk and change detection have begun.
    PackageStarted { package: String },
    /// A `BUILD_REQUEST` was dispatched for this file.
    FileStarted { package: String, relative_path: String },
    /// The file was not submitted to a compiler worker.
    FileSkipped {
        package: String,
        relative_path: String,
        reason: String,
    },
    /// The file's compiler reported success.
    FileSuccess { package: String, relative_path: String },
    /// The file's compiler reported failure, or its worker crashed.
    FileError {
        package: String,
        relative_path: String,
        errors: Vec<String>,
    },
    /// Every file in the package has reached a terminal state and its
    /// databases have been persisted if dirty.
    PackageComplete { package: String, error_count: usize },
    /// Every package has completed and the compiler cache has shut down.
    ProjectComplete,
}

/// Subscriber for the build event stream. Implementations are driven
/// synchronously from within `builder::build_project`'s async loop.
pub trait BuildObserver {
    fn on_event(&mut self, event: BuildEvent);
}

/// An observer that discards every event; useful when only the final
/// [`crate::builder::BuildSummary`] matters.
#[derive(Debug, Default)]
pub struct NullObserver;

impl BuildObserver for NullObserver {
    fn on_event(&mut self, _event: BuildEvent) {}
}

/// An observer that records every event in order, for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<BuildEvent>,
}

impl BuildObserver for RecordingObserver {
    fn on_event(&mut self, event: BuildEvent) {
        self.events.push(event);
    }
}
