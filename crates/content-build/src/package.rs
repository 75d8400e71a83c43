//! Package: a logical group of sources, `spec.md` §4.4.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::source_db::SourceDatabase;
use crate::target::Target;

/// Directory layout under the packages/database roots:
/// `{package_name}.source/` for sources, `{package_name}.{platform}.target/`
/// for outputs, with databases at `{package_name}.source.json` and
/// `{package_name}.{platform}.target.json`.
pub struct Package {
    pub project_name: String,
    pub package_name: String,
    pub source_path: PathBuf,
    pub database_path: PathBuf,
    pub database: SourceDatabase,
    pub targets: HashMap<String, Target>,
}

impl Package {
    pub fn create(
        package_root: &Path,
        database_root: &Path,
        project_name: &str,
        package_name: &str,
    ) -> Result<Self> {
        let source_path = package_root.join(format!("{package_name}.source"));
        let database_path = database_root.join(format!("{package_name}.source.json"));

        fs::create_dir_all(&source_path)
            .map_err(|err| crate::error::Error::Io(source_path.clone(), err))?;

        let database = SourceDatabase::load(&database_path, package_name)?;

        Ok(Self {
            project_name: project_name.to_owned(),
            package_name: package_name.to_owned(),
            source_path,
            database_path,
            database,
            targets: HashMap::new(),
        })
    }

    /// Get-or-insert the [`Target`] for `platform_name`. Targets are
    /// created lazily on first mention of a platform.
    pub fn target_platform(
        &mut self,
        package_root: &Path,
        database_root: &Path,
        platform_name: &str,
    ) -> Result<&mut Target> {
        let platform_name = if platform_name.is_empty() {
            crate::resource_path::GENERIC_PLATFORM
        } else {
            platform_name
        };

        if !self.targets.contains_key(platform_name) {
            let target_path = package_root.join(format!("{}.{}.target", self.package_name, platform_name));
            let database_path =
                database_root.join(format!("{}.{}.target.json", self.package_name, platform_name));
            let target = Target::create(
                package_root,
                target_path,
                database_path,
                &self.package_name,
                platform_name,
                &self.package_name,
            )?;
            self.targets.insert(platform_name.to_owned(), target);
        }
        Ok(self.targets.get_mut(platform_name).unwrap())
    }

    /// Enumerates directory entries under `package_root` at depth 1,
    /// interpreting any directory named `{package_name}.{platform}.target`
    /// as a Target to instantiate (platform `"generic"` if the middle
    /// segment is absent).
    pub fn cache_targets(&mut self, package_root: &Path, database_root: &Path) -> Result<()> {
        let entries = match fs::read_dir(package_root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(crate::error::Error::Io(package_root.to_owned(), err)),
        };

        for entry in entries {
            let entry = entry.map_err(|err| crate::error::Error::Io(package_root.to_owned(), err))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // `{package_name}.target` (platform segment entirely absent) and
            // `{package_name}.{platform}.target` both strip to a suffix that is
            // either empty or a leading-dot platform tag.
            let Some(rest) = name.strip_prefix(&self.package_name) else { continue };
            let Some(middle) = rest.strip_suffix(".target") else { continue };
            let platform = match middle.strip_prefix('.') {
                Some(platform) if !platform.is_empty() => platform,
                Some(_) | None if middle.is_empty() => crate::resource_path::GENERIC_PLATFORM,
                _ => continue,
            };
            self.target_platform(package_root, database_root, platform)?;
        }
        Ok(())
    }
}
