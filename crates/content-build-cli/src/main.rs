//! `content-build` — command-line front end over the [`content_build`]
//! library.
//!
//! Thin by design: argument parsing, a pretty-printing [`BuildObserver`],
//! and mapping the resulting [`content_build::BuildSummary`] onto a
//! process exit code. All of the actual build logic lives in the library
//! crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use content_build::{BuildEvent, BuildObserver, ProjectOptions};

#[derive(Parser, Debug)]
#[clap(name = "content-build")]
#[clap(about = "Incremental content build pipeline", version, author)]
struct Cli {
    /// Project directory. The parent directory is the project root and
    /// the final path segment is the project name, e.g. `--project
    /// /game/content/main` opens or creates project `main` under
    /// `/game/content`.
    #[clap(long)]
    project: PathBuf,

    /// Suppress per-file event output; only the final summary line (and
    /// any errors) are printed.
    #[clap(long)]
    silent: bool,

    /// Build platform. Omit for the generic, platform-agnostic build.
    #[clap(long)]
    platform: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every package in the project.
    Build,
}

fn init_tracing(silent: bool) {
    if silent {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.silent);

    let Some((project_root, project_name)) = split_project_path(&cli.project) else {
        eprintln!("project not found: '{}'", cli.project.display());
        return ExitCode::from(2);
    };

    let mut project = match ProjectOptions::new(project_root, project_name).create_or_open() {
        Ok(project) => project,
        Err(err) => {
            eprintln!("project not found: {err}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Build => {
            let mut observer = PrettyObserver { silent: cli.silent };
            let summary =
                match content_build::build_project(&mut project, cli.platform.as_deref(), &mut observer).await {
                    Ok(summary) => summary,
                    Err(err) => {
                        eprintln!("build failed: {err}");
                        return ExitCode::from(1);
                    }
                };

            let total_errors = summary.total_errors();
            if !cli.silent {
                println!(
                    "build complete: {} package(s), {} error(s)",
                    summary.package_error_counts.len(),
                    total_errors
                );
            }
            if total_errors > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// Splits `--project PATH` into `(project_root, project_name)`: the
/// parent directory and final path segment, matching the directory
/// layout `Project::create` expects (`project_root/project_name/...`).
fn split_project_path(path: &std::path::Path) -> Option<(PathBuf, String)> {
    let project_name = path.file_name()?.to_str()?.to_owned();
    let project_root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((project_root, project_name))
}

/// Prints one line per event unless `--silent`. Errors are always printed,
/// even in silent mode, since they are the caller's only signal short of
/// the exit code.
struct PrettyObserver {
    silent: bool,
}

impl BuildObserver for PrettyObserver {
    fn on_event(&mut self, event: BuildEvent) {
        match event {
            BuildEvent::Ready => {
                if !self.silent {
                    println!("ready");
                }
            }
            BuildEvent::PackageStarted { package } => {
                if !self.silent {
                    println!("package:started {package}");
                }
            }
            BuildEvent::FileStarted { package, relative_path } => {
                if !self.silent {
                    println!("file:started {package}/{relative_path}");
                }
            }
            BuildEvent::FileSkipped {
                package,
                relative_path,
                reason,
            } => {
                if !self.silent {
                    println!("file:skipped {package}/{relative_path} ({reason})");
                }
            }
            BuildEvent::FileSuccess { package, relative_path } => {
                if !self.silent {
                    println!("file:success {package}/{relative_path}");
                }
            }
            BuildEvent::FileError {
                package,
                relative_path,
                errors,
            } => {
                eprintln!("file:error {package}/{relative_path}: {}", errors.join("; "));
            }
            BuildEvent::PackageComplete { package, error_count } => {
                if !self.silent {
                    println!("package:complete {package} ({error_count} error(s))");
                }
            }
            BuildEvent::ProjectComplete => {
                if !self.silent {
                    println!("project:complete");
                }
            }
        }
    }
}
