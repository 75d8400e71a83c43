//! Project: a container of Packages plus a pipeline definition.
//! `spec.md` §4.5.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use content_build_compiler::PipelineDefinition;

use crate::error::Result;
use crate::package::Package;

/// Directory layout under `project.root_path`, `spec.md` §6:
/// `processors/`, `packages/`, `database/`, `pipeline.json`.
pub struct Project {
    pub project_name: String,
    pub root_path: PathBuf,
    pub package_root: PathBuf,
    pub database_root: PathBuf,
    pub processor_root: PathBuf,
    pub pipeline_path: PathBuf,
    pub pipeline: PipelineDefinition,
    pub packages: HashMap<String, Package>,
}

impl Project {
    pub fn create(project_root: &Path, project_name: &str) -> Result<Self> {
        let root_path = project_root.join(project_name);
        let processor_root = root_path.join("processors");
        let package_root = root_path.join("packages");
        let database_root = root_path.join("database");
        let pipeline_path = root_path.join("pipeline.json");

        for dir in [&processor_root, &package_root, &database_root] {
            fs::create_dir_all(dir).map_err(|err| crate::error::Error::Io(dir.clone(), err))?;
        }

        let pipeline = PipelineDefinition::load(&pipeline_path)?;

        Ok(Self {
            project_name: project_name.to_owned(),
            root_path,
            package_root,
            database_root,
            processor_root,
            pipeline_path,
            pipeline,
            packages: HashMap::new(),
        })
    }

    /// Get-or-insert the [`Package`] named `name`.
    pub fn content_package(&mut self, name: &str) -> Result<&mut Package> {
        if !self.packages.contains_key(name) {
            let package = Package::create(&self.package_root, &self.database_root, &self.project_name, name)?;
            self.packages.insert(name.to_owned(), package);
        }
        Ok(self.packages.get_mut(name).unwrap())
    }

    /// Enumerates directory entries under `package_root` at depth 1,
    /// interpreting any directory `{name}.source` as a Package to
    /// instantiate, then caches each package's existing Targets.
    pub fn cache_packages(&mut self) -> Result<()> {
        let entries = match fs::read_dir(&self.package_root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(crate::error::Error::Io(self.package_root.clone(), err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| crate::error::Error::Io(self.package_root.clone(), err))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(package_name) = name.strip_suffix(".source") else { continue };
            names.push(package_name.to_owned());
        }

        for name in names {
            self.content_package(&name)?;
            let package = self.packages.get_mut(&name).unwrap();
            package.cache_targets(&self.package_root, &self.database_root)?;
        }
        Ok(())
    }
}

/// Builder for [`Project`], mirroring the options pattern used elsewhere
/// in this pipeline to collect mandatory and optional construction
/// parameters before a fallible `create`/`open` call.
pub struct ProjectOptions {
    project_root: PathBuf,
    project_name: String,
}

impl ProjectOptions {
    pub fn new(project_root: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            project_name: project_name.into(),
        }
    }

    /// Creates (or reopens) the project and caches its existing packages
    /// and targets from disk.
    pub fn create_or_open(&self) -> Result<Project> {
        let mut project = Project::create(&self.project_root, &self.project_name)?;
        project.cache_packages()?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_materialises_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::create(dir.path(), "demo").unwrap();
        assert!(project.processor_root.is_dir());
        assert!(project.package_root.is_dir());
        assert!(project.database_root.is_dir());
        assert!(project.pipeline.is_empty());
    }

    #[test]
    fn cache_packages_discovers_existing_source_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::create(dir.path(), "demo").unwrap();
        fs::create_dir_all(project.package_root.join("foo.source")).unwrap();

        project.cache_packages().unwrap();
        assert!(project.packages.contains_key("foo"));
    }

    #[test]
    fn options_create_or_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProjectOptions::new(dir.path(), "demo");
        let project = options.create_or_open().unwrap();
        assert_eq!(project.project_name, "demo");
    }
}
