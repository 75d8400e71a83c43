//! Target: a per-package, per-platform output descriptor.
//! `spec.md` §3/§4.4.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::hash::target_stem;
use crate::target_db::TargetDatabase;

/// Owns one platform's compiled output tree and its [`TargetDatabase`].
///
/// `target_path_for` is the deterministic, bit-stable mapping described
/// in `spec.md` §3: the stem is the lowercase-hex rotating hash of the
/// resource name's UTF-16 code units, joined under `target_path`. The
/// compiler appends `.resourceType` to form the final output path —
/// this type never adds the extension itself.
#[derive(Debug)]
pub struct Target {
    pub root_path: PathBuf,
    pub target_path: PathBuf,
    pub package_name: String,
    pub platform_name: String,
    pub database_path: PathBuf,
    pub database: TargetDatabase,
}

impl Target {
    /// Ensures `target_path` exists on disk and loads or initialises its
    /// database. An empty `platform_name` is normalised to the reserved
    /// platform `"generic"`.
    pub fn create(
        root_path: &Path,
        target_path: PathBuf,
        database_path: PathBuf,
        package_name: &str,
        platform_name: &str,
        bundle_name: &str,
    ) -> Result<Self> {
        let platform_name = if platform_name.is_empty() {
            crate::resource_path::GENERIC_PLATFORM.to_owned()
        } else {
            platform_name.to_owned()
        };

        fs::create_dir_all(&target_path)
            .map_err(|err| crate::error::Error::Io(target_path.clone(), err))?;

        let database = TargetDatabase::load(&database_path, bundle_name, &platform_name)?;

        Ok(Self {
            root_path: root_path.to_owned(),
            target_path,
            package_name: package_name.to_owned(),
            platform_name,
            database_path,
            database,
        })
    }

    /// The absolute path this resource's primary compiled output (sans
    /// extension) is written to.
    pub fn target_path_for(&self, resource_name: &str) -> PathBuf {
        self.target_path.join(target_stem(resource_name))
    }

    pub fn save(&mut self) -> Result<()> {
        self.database.save(&self.database_path)
    }
}
