//! End-to-end build scenarios (`spec.md` §8, S1-S6), driving a real
//! `content-build-compiler::CompilerCache` against the fixture compiler
//! binaries under `tests/fixtures/`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use content_build::events::{BuildEvent, RecordingObserver};
use content_build::project::Project;

/// The directory cargo places test and dev-dependency binaries in: the
/// parent of the current test executable, with a trailing `deps`
/// segment popped if present.
fn processor_root() -> PathBuf {
    let mut path = env::current_exe().expect("current test executable path");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path
}

/// Registers `compiler_name` (a dev-dependency binary built alongside
/// this test) for `resource_type`, by its absolute path — the project's
/// own `processors/` directory is empty in these tests, so a bare
/// executable name would not resolve.
fn write_pipeline(project: &mut Project, resource_type: &str, compiler_name: &str) {
    let executable = processor_root()
        .join(format!("{compiler_name}{}", env::consts::EXE_SUFFIX))
        .to_string_lossy()
        .into_owned();
    project.pipeline.insert(
        resource_type.to_owned(),
        content_build_compiler::CompilerDef {
            executable,
            args: vec![],
        },
    );
}

fn bump_mtime(path: &Path) {
    let now = SystemTime::now() + Duration::from_secs(2);
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(now).unwrap();
}

#[tokio::test]
async fn s1_fresh_build_reports_success_and_records_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "copy-compiler");

    let package = project.content_package("foo").unwrap();
    fs::write(package.source_path.join("bar.txt"), b"hello").unwrap();

    let mut observer = RecordingObserver::default();
    let summary = content_build::build_project(&mut project, None, &mut observer)
        .await
        .unwrap();
    assert_eq!(summary.total_errors(), 0);

    let kinds: Vec<&str> = observer
        .events
        .iter()
        .map(|event| match event {
            BuildEvent::Ready => "ready",
            BuildEvent::PackageStarted { .. } => "package:started",
            BuildEvent::FileStarted { .. } => "file:started",
            BuildEvent::FileSuccess { .. } => "file:success",
            BuildEvent::PackageComplete { .. } => "package:complete",
            BuildEvent::ProjectComplete => "project:complete",
            BuildEvent::FileSkipped { .. } => "file:skipped",
            BuildEvent::FileError { .. } => "file:error",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "ready",
            "package:started",
            "file:started",
            "file:success",
            "package:complete",
            "project:complete",
        ]
    );

    let db_path = dir.path().join("demo/database/foo.source.json");
    assert!(db_path.is_file());
    let text = fs::read_to_string(db_path).unwrap();
    assert!(text.contains("\"resource_type\": \"txt\""));
}

#[tokio::test]
async fn s2_incremental_rerun_skips_unmodified_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "copy-compiler");

    let package = project.content_package("foo").unwrap();
    let source_file = package.source_path.join("bar.txt");
    fs::write(&source_file, b"hello").unwrap();

    let mut first = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut first).await.unwrap();

    let output_path = {
        let package = project.content_package("foo").unwrap();
        let target = package.targets.get("generic").unwrap();
        target.target_path_for("bar")
    };
    let before = fs::metadata(format!("{}.txt", output_path.display())).unwrap().modified().unwrap();

    let mut second = RecordingObserver::default();
    let summary = content_build::build_project(&mut project, None, &mut second)
        .await
        .unwrap();
    assert_eq!(summary.total_errors(), 0);

    assert!(!second.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(second.events.iter().any(|e| matches!(
        e,
        BuildEvent::FileSkipped { reason, .. } if reason == "up to date"
    )));

    let after = fs::metadata(format!("{}.txt", output_path.display())).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn s3_touching_a_dependency_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "refs-compiler");

    let package = project.content_package("foo").unwrap();
    fs::write(package.source_path.join("bar.txt"), b"hello").unwrap();
    let dep_path = package.source_path.join("baz.dep");
    fs::write(&dep_path, b"dep").unwrap();

    let mut first = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut first).await.unwrap();
    assert!(first.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));

    bump_mtime(&dep_path);

    let mut second = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut second).await.unwrap();
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));
}

#[tokio::test]
async fn s3b_dependency_created_before_its_dependent_in_walk_order_still_invalidates() {
    // `fs_util::walk` returns files sorted, and "baz.dep" < "zzz.txt", so
    // the dependency is `create`d (and its baseline captured) before its
    // dependent on this and every later walk. Regression for change
    // detection comparing against a live, already-refreshed entry instead
    // of the pre-walk baseline.
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "refs-compiler");

    let package = project.content_package("foo").unwrap();
    fs::write(package.source_path.join("zzz.txt"), b"hello").unwrap();
    let dep_path = package.source_path.join("baz.dep");
    fs::write(&dep_path, b"dep").unwrap();

    let mut first = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut first).await.unwrap();
    assert!(first.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));

    bump_mtime(&dep_path);

    let mut second = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut second).await.unwrap();
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));
}

#[tokio::test]
async fn s3c_editing_the_primary_source_file_triggers_rebuild() {
    // Regression: `build_package_sync` used to run change detection
    // against the entry `create()` had just refreshed to the current
    // stat, so editing a file and rebuilding always reported "up to
    // date" instead of rebuilding it.
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "copy-compiler");

    let package = project.content_package("foo").unwrap();
    let source_file = package.source_path.join("bar.txt");
    fs::write(&source_file, b"hello").unwrap();

    let mut first = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut first).await.unwrap();
    assert!(first.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));

    let now = SystemTime::now() + Duration::from_secs(2);
    fs::write(&source_file, b"hello, world").unwrap();
    fs::File::options().write(true).open(&source_file).unwrap().set_modified(now).unwrap();

    let mut second = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut second).await.unwrap();
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));
}

#[tokio::test]
async fn s4_missing_output_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "copy-compiler");

    let package = project.content_package("foo").unwrap();
    fs::write(package.source_path.join("bar.txt"), b"hello").unwrap();

    let mut first = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut first).await.unwrap();

    let output_path = {
        let package = project.content_package("foo").unwrap();
        let target = package.targets.get("generic").unwrap();
        format!("{}.txt", target.target_path_for("bar").display())
    };
    fs::remove_file(&output_path).unwrap();

    let mut second = RecordingObserver::default();
    content_build::build_project(&mut project, None, &mut second).await.unwrap();
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(second.events.iter().any(|e| matches!(e, BuildEvent::FileSuccess { .. })));
    assert!(Path::new(&output_path).is_file());
}

#[tokio::test]
async fn s5_platform_mismatch_is_skipped_without_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "copy-compiler");

    let package_root = project.package_root.clone();
    let database_root = project.database_root.clone();
    {
        let package = project.content_package("foo").unwrap();
        package.target_platform(&package_root, &database_root, "android").unwrap();
        package.target_platform(&package_root, &database_root, "ios").unwrap();
        fs::write(package.source_path.join("bar.ios.txt"), b"hello").unwrap();
    }

    let mut observer = RecordingObserver::default();
    content_build::build_project(&mut project, Some("android"), &mut observer)
        .await
        .unwrap();

    assert!(!observer.events.iter().any(|e| matches!(e, BuildEvent::FileStarted { .. })));
    assert!(observer.events.iter().any(|e| matches!(
        e,
        BuildEvent::FileSkipped { reason, .. } if reason == "platform mismatch"
    )));
}

#[tokio::test]
async fn s6_compiler_failure_is_reported_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut project = Project::create(dir.path(), "demo").unwrap();
    write_pipeline(&mut project, "txt", "failing-compiler");

    let package = project.content_package("foo").unwrap();
    fs::write(package.source_path.join("bar.txt"), b"hello").unwrap();

    let mut observer = RecordingObserver::default();
    let summary = content_build::build_project(&mut project, None, &mut observer)
        .await
        .unwrap();

    assert_eq!(summary.total_errors(), 1);
    assert!(observer.events.iter().any(|e| matches!(
        e,
        BuildEvent::FileError { errors, .. } if errors == &vec!["bad input".to_owned()]
    )));
}
