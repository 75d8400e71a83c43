//! Top-level build driver, `spec.md` §4.9.
//!
//! Walks each package, applies change detection, submits work to the
//! [`content_build_compiler::CompilerCache`], consumes results, updates the
//! source and target databases, and raises [`BuildEvent`]s as it goes.

use std::collections::HashMap;
use std::path::Path;

use content_build_compiler::{BuildInput, CacheEvent, CompilerCache};
use tracing::{debug, info, warn};

use crate::change_detection;
use crate::error::{Error, Result};
use crate::events::{BuildEvent, BuildObserver};
use crate::fs_util;
use crate::hash;
use crate::project::Project;
use crate::resource_path;

/// Outcome of a full project build: the final error count per package, so
/// the caller (typically the CLI) can derive a process exit code.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub package_error_counts: HashMap<String, usize>,
}

impl BuildSummary {
    pub fn total_errors(&self) -> usize {
        self.package_error_counts.values().sum()
    }
}

/// Per-package bookkeeping the Builder needs while packages are in flight.
/// Distinct from [`crate::package::Package`], which is the persisted data
/// model; this is purely the orchestrator's transient state.
struct PackageState {
    pending_files: usize,
    error_count: usize,
}

/// One in-flight submission, enough to translate a `CacheEvent` keyed by
/// absolute source path back to the package and source entry it came from.
struct InFlight {
    package: String,
    relative_path: String,
    stem: String,
    compiler_name: String,
}

/// Runs a full build of every package in `project` for `platform` (`None`
/// means a generic build), reporting progress to `observer`.
///
/// Corresponds to `spec.md` §4.9 `buildProject`/`buildPackage`: the
/// compiler cache is created once for the whole project (one worker per
/// resource type, shared across packages); each package's source tree is
/// walked synchronously, change detection decides what to submit, and the
/// cache's asynchronous `BUILD_RESULT` stream drives completion.
pub async fn build_project(
    project: &mut Project,
    platform: Option<&str>,
    observer: &mut dyn BuildObserver,
) -> Result<BuildSummary> {
    let target_platform = platform.unwrap_or(resource_path::GENERIC_PLATFORM);
    info!(project = %project.project_name, platform = %target_platform, "starting project build");

    let (cache, mut cache_events) =
        CompilerCache::new(&project.processor_root, project.pipeline.clone()).await?;

    // The first event out of a freshly created cache is always `Ready`:
    // nothing has been submitted yet, so no `Started`/`Skipped`/`Complete`
    // can have been raised before it.
    match cache_events.recv().await {
        Some(CacheEvent::Ready) => observer.on_event(BuildEvent::Ready),
        Some(_) | None => {
            return Err(Error::Build(
                "compiler cache did not emit `ready` first".to_owned(),
            ))
        }
    }

    let package_names: Vec<String> = project.packages.keys().cloned().collect();
    if package_names.is_empty() {
        cache.shutdown();
        drain_until_terminated(&mut cache_events).await;
        observer.on_event(BuildEvent::ProjectComplete);
        return Ok(BuildSummary::default());
    }

    let mut states: HashMap<String, PackageState> = HashMap::new();
    let mut inflight: HashMap<String, InFlight> = HashMap::new();
    let mut pending_packages = package_names.len();

    for package_name in &package_names {
        let state = build_package_sync(
            project,
            package_name,
            target_platform,
            &cache,
            &mut inflight,
            observer,
        )?;
        states.insert(package_name.clone(), state);
    }

    let mut summary = BuildSummary::default();

    // A package whose walk submitted nothing (every file up to date, or the
    // package is empty) has already reached `pending_files == 0`; it must be
    // finalised here rather than waiting for a `CacheEvent` that will never
    // arrive for it (`spec.md` §4.9: "If pendingFiles == 0, finalise the
    // package" happens right after the walk, not only on worker completion).
    for package_name in &package_names {
        maybe_complete_package(
            project,
            package_name,
            &mut states,
            &mut pending_packages,
            &cache,
            &mut summary,
            observer,
        )?;
    }

    loop {
        if pending_packages == 0 {
            break;
        }
        let Some(event) = cache_events.recv().await else {
            break;
        };
        match event {
            CacheEvent::Ready => {}
            CacheEvent::Started { input } => {
                if let Some(flight) = inflight.get(&input.source_path) {
                    observer.on_event(BuildEvent::FileStarted {
                        package: flight.package.clone(),
                        relative_path: flight.relative_path.clone(),
                    });
                }
            }
            CacheEvent::Skipped { input, reason } => {
                if let Some(finished) =
                    finish_inflight(&mut inflight, &input, &mut states, false)
                {
                    observer.on_event(BuildEvent::FileSkipped {
                        package: finished.package.clone(),
                        relative_path: finished.relative_path.clone(),
                        reason,
                    });
                    maybe_complete_package(
                        project,
                        &finished.package,
                        &mut states,
                        &mut pending_packages,
                        &cache,
                        &mut summary,
                        observer,
                    )?;
                }
            }
            CacheEvent::Complete { outcome } => {
                if let Some(finished) =
                    finish_inflight(&mut inflight, &outcome.input, &mut states, !outcome.success)
                {
                    if outcome.success {
                        record_success(project, &finished, &outcome, target_platform)?;
                        observer.on_event(BuildEvent::FileSuccess {
                            package: finished.package.clone(),
                            relative_path: finished.relative_path.clone(),
                        });
                    } else {
                        observer.on_event(BuildEvent::FileError {
                            package: finished.package.clone(),
                            relative_path: finished.relative_path.clone(),
                            errors: outcome.errors.clone(),
                        });
                    }
                    maybe_complete_package(
                        project,
                        &finished.package,
                        &mut states,
                        &mut pending_packages,
                        &cache,
                        &mut summary,
                        observer,
                    )?;
                }
            }
            CacheEvent::Terminated => {}
        }
    }

    drain_until_terminated(&mut cache_events).await;
    info!(total_errors = summary.total_errors(), "project build complete");
    observer.on_event(BuildEvent::ProjectComplete);
    Ok(summary)
}

/// Walks one package's source tree, runs change detection over every file,
/// and submits whatever requires a rebuild. Synchronous by design (`spec.md`
/// §5: "filesystem walks during buildPackage [are] synchronous in the
/// reference design").
fn build_package_sync(
    project: &mut Project,
    package_name: &str,
    target_platform: &str,
    cache: &CompilerCache,
    inflight: &mut HashMap<String, InFlight>,
    observer: &mut dyn BuildObserver,
) -> Result<PackageState> {
    let package = project.content_package(package_name)?;
    package.target_platform(&project.package_root, &project.database_root, target_platform)?;

    observer.on_event(BuildEvent::PackageStarted {
        package: package_name.to_owned(),
    });

    let known_platforms: Vec<String> = package.targets.keys().cloned().collect();
    let known_platform_refs: Vec<&str> = known_platforms.iter().map(String::as_str).collect();

    let files = fs_util::walk(&package.source_path, true, true)?;
    debug!(package = %package_name, count = files.len(), "walked package source tree");

    // Captured once, before any `create()` call below refreshes an
    // entry's `write_time`/`file_size` to the current stat. Change
    // detection runs against this baseline rather than the live
    // database, so a file's own edit (or a dependency's, even if that
    // dependency was already walked earlier in this same pass) is still
    // detected regardless of walk order.
    let baseline = change_detection::snapshot(&package.database);

    let mut pending_files = 0;
    for file in &files {
        // `create` always resets `dependencies`/`references` to empty
        // (`spec.md` §4.2); restore whatever was recorded on the previous
        // build from the baseline so change detection still sees the
        // dependency graph. A successful rebuild later replaces
        // `dependencies` with the compiler's fresh report
        // (`record_success`); an unmodified file keeps what it had.
        let relative_path = package
            .database
            .create(&package.source_path, file, &known_platform_refs)?
            .relative_path
            .clone();

        if let Some(previous) = baseline.get(&relative_path) {
            if let Some(entry) = package.database.query_mut_by_relative_path(&relative_path) {
                entry.dependencies = previous.dependencies.clone();
                entry.references = previous.references.clone();
            }
        }

        let source_path = package
            .database
            .query_by_relative_path(&relative_path)
            .expect("entry just created")
            .clone();

        if source_path.platform != target_platform {
            observer.on_event(BuildEvent::FileSkipped {
                package: package_name.to_owned(),
                relative_path: source_path.relative_path.clone(),
                reason: "platform mismatch".to_owned(),
            });
            continue;
        }

        let target = package.targets.get(target_platform).expect("just created above");
        let stem = hash::target_stem(&source_path.resource_name);
        let target_entry = target.database.query_by_relative_path(&stem);

        if !change_detection::requires_rebuild(&package.source_path, &baseline, &relative_path, target_entry) {
            observer.on_event(BuildEvent::FileSkipped {
                package: package_name.to_owned(),
                relative_path: source_path.relative_path.clone(),
                reason: "up to date".to_owned(),
            });
            continue;
        }

        let compiler_name = project
            .pipeline
            .compiler_for(&source_path.resource_type)
            .map(|def| def.executable.clone())
            .unwrap_or_default();

        let abs_source_path = package.source_path.join(&source_path.relative_path);
        let abs_target_path = target.target_path_for(&source_path.resource_name);
        let source_path_key = abs_source_path.to_string_lossy().into_owned();

        inflight.insert(
            source_path_key.clone(),
            InFlight {
                package: package_name.to_owned(),
                relative_path: source_path.relative_path.clone(),
                stem,
                compiler_name,
            },
        );

        cache.build(BuildInput {
            bundle: package_name.to_owned(),
            target: target_platform.to_owned(),
            source_path: source_path_key,
            target_path: abs_target_path.to_string_lossy().into_owned(),
            resource_name: source_path.resource_name.clone(),
            resource_type: source_path.resource_type.clone(),
            platform: target_platform.to_owned(),
        });
        pending_files += 1;
    }

    Ok(PackageState {
        pending_files,
        error_count: 0,
    })
}

fn finish_inflight(
    inflight: &mut HashMap<String, InFlight>,
    input: &BuildInput,
    states: &mut HashMap<String, PackageState>,
    is_error: bool,
) -> Option<InFlight> {
    let finished = inflight.remove(&input.source_path)?;
    if let Some(state) = states.get_mut(&finished.package) {
        state.pending_files -= 1;
        if is_error {
            state.error_count += 1;
        }
    }
    Some(finished)
}

fn record_success(
    project: &mut Project,
    finished: &InFlight,
    outcome: &content_build_compiler::BuildOutcome,
    target_platform: &str,
) -> Result<()> {
    let package = project.content_package(&finished.package)?;
    let known_platforms: Vec<String> = package.targets.keys().cloned().collect();
    let known_platform_refs: Vec<&str> = known_platforms.iter().map(String::as_str).collect();

    for reference in &outcome.references {
        let ref_path = Path::new(reference);
        let ref_entry = package
            .database
            .create(&package.source_path, ref_path, &known_platform_refs)?
            .clone();
        if let Some(entry) = package.database.query_mut_by_relative_path(&ref_entry.relative_path) {
            if !entry.references.contains(&finished.relative_path) {
                entry.references.push(finished.relative_path.clone());
            }
        }
    }

    if let Some(entry) = package.database.query_mut_by_relative_path(&finished.relative_path) {
        entry.dependencies = outcome.references.clone();
    }

    let source_path = package
        .database
        .query_by_relative_path(&finished.relative_path)
        .expect("entry created during walk")
        .clone();

    let target = package
        .targets
        .get_mut(target_platform)
        .expect("target created during buildPackage");

    target.database.create(
        &finished.stem,
        &source_path.resource_name,
        &source_path.resource_type,
        target_platform,
        source_path.properties.clone(),
        &finished.relative_path,
        &finished.compiler_name,
        outcome.compiler_version.unwrap_or(0),
        outcome.outputs.clone(),
    );

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn maybe_complete_package(
    project: &mut Project,
    package_name: &str,
    states: &mut HashMap<String, PackageState>,
    pending_packages: &mut usize,
    cache: &CompilerCache,
    summary: &mut BuildSummary,
    observer: &mut dyn BuildObserver,
) -> Result<()> {
    let Some(state) = states.get(package_name) else {
        return Ok(());
    };
    if state.pending_files != 0 {
        return Ok(());
    }
    let error_count = state.error_count;

    let package = project.content_package(package_name)?;
    if package.database.is_dirty() {
        let db_path = package.database_path.clone();
        package.database.save(&db_path)?;
        debug!(package = %package_name, path = %db_path.display(), "persisted source database");
    }
    for target in package.targets.values_mut() {
        if target.database.is_dirty() {
            target.save()?;
            debug!(package = %package_name, platform = %target.platform_name, "persisted target database");
        }
    }

    if error_count > 0 {
        warn!(package = %package_name, error_count, "package build finished with errors");
    } else {
        info!(package = %package_name, "package build complete");
    }
    summary.package_error_counts.insert(package_name.to_owned(), error_count);
    observer.on_event(BuildEvent::PackageComplete {
        package: package_name.to_owned(),
        error_count,
    });

    *pending_packages -= 1;
    if *pending_packages == 0 {
        cache.shutdown();
    }
    Ok(())
}

async fn drain_until_terminated(events: &mut tokio::sync::mpsc::UnboundedReceiver<CacheEvent>) {
    while let Some(event) = events.recv().await {
        if matches!(event, CacheEvent::Terminated) {
            break;
        }
    }
}
