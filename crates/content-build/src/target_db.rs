//! Target Database, `spec.md` §4.3/§6.
//!
//! Same shape as the Source Database, minus dependency tracking, plus
//! compiler identity and an output file list.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetEntry {
    pub relative_path: String,
    pub resource_name: String,
    pub resource_type: String,
    pub platform: String,
    pub properties: Vec<String>,
    /// Relative to the *package source root*, not the target root — see
    /// the data-model note in `spec.md` §9 about an earlier revision of
    /// this database recording it relative to the wrong root.
    pub source_path: String,
    pub compiler_name: String,
    pub compiler_version: i64,
    /// Absolute paths of every file the compiler wrote.
    pub outputs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TargetContent {
    bundle_name: String,
    platform: String,
    entries: Vec<TargetEntry>,
}

impl TargetContent {
    fn pre_serialize(&mut self) {
        self.entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    }
}

#[derive(Debug)]
pub struct TargetDatabase {
    bundle_name: String,
    platform: String,
    entries: Vec<TargetEntry>,
    entry_table: HashMap<String, usize>,
    dirty: bool,
}

impl TargetDatabase {
    fn reindex(&mut self) {
        self.entry_table = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.relative_path.clone(), i))
            .collect();
    }

    pub fn load(path: &Path, bundle_name: &str, platform: &str) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "target database absent, starting empty");
                return Ok(Self {
                    bundle_name: bundle_name.to_owned(),
                    platform: platform.to_owned(),
                    entries: Vec::new(),
                    entry_table: HashMap::new(),
                    dirty: true,
                });
            }
            Err(err) => return Err(Error::Io(path.to_owned(), err)),
        };
        let content: TargetContent =
            serde_json::from_str(&text).map_err(|err| Error::Format(path.to_owned(), err))?;
        let mut db = Self {
            bundle_name: content.bundle_name,
            platform: content.platform,
            entries: content.entries,
            entry_table: HashMap::new(),
            dirty: false,
        };
        db.reindex();
        debug!(path = %path.display(), entries = db.entries.len(), "loaded target database");
        Ok(db)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let mut content = TargetContent {
            bundle_name: self.bundle_name.clone(),
            platform: self.platform.clone(),
            entries: self.entries.clone(),
        };
        content.pre_serialize();
        let text = serde_json::to_string_pretty(&content)
            .map_err(|err| Error::Format(path.to_owned(), err))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Io(parent.to_owned(), err))?;
        }
        fs::write(path, text).map_err(|err| Error::Io(path.to_owned(), err))?;
        self.dirty = false;
        debug!(path = %path.display(), entries = self.entries.len(), "saved target database");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn query_by_relative_path(&self, relative_path: &str) -> Option<&TargetEntry> {
        self.entry_table.get(relative_path).map(|&i| &self.entries[i])
    }

    /// Creates or overwrites the entry at `relative_path`. `source_path`
    /// must already be relative to the package source root; callers do
    /// not pass an absolute path here.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        relative_path: &str,
        resource_name: &str,
        resource_type: &str,
        platform: &str,
        properties: Vec<String>,
        source_path: &str,
        compiler_name: &str,
        compiler_version: i64,
        outputs: Vec<String>,
    ) -> &TargetEntry {
        let entry = TargetEntry {
            relative_path: relative_path.to_owned(),
            resource_name: resource_name.to_owned(),
            resource_type: resource_type.to_owned(),
            platform: platform.to_owned(),
            properties,
            source_path: source_path.to_owned(),
            compiler_name: compiler_name.to_owned(),
            compiler_version,
            outputs,
        };
        match self.entry_table.get(relative_path) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.entry_table.insert(relative_path.to_owned(), self.entries.len());
                self.entries.push(entry);
            }
        }
        self.dirty = true;
        self.query_by_relative_path(relative_path).unwrap()
    }

    pub fn remove(&mut self, relative_path: &str) {
        if let Some(&idx) = self.entry_table.get(relative_path) {
            self.entries.remove(idx);
            self.reindex();
            self.dirty = true;
        }
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }
}

/// `buildOutputsExist`: no entry means nothing to verify against, so the
/// build is allowed to proceed (returns `true`); otherwise every
/// recorded output path must still exist on disk.
pub fn build_outputs_exist(entry: Option<&TargetEntry>) -> bool {
    match entry {
        None => true,
        Some(entry) => entry.outputs.iter().all(|p| Path::new(p).exists()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_and_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.android.target.json");
        let db = TargetDatabase::load(&path, "foo", "android").unwrap();
        assert!(db.is_dirty());
        assert!(db.entries().is_empty());
    }

    #[test]
    fn create_records_source_path_relative_to_source_root() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("foo.android.target.json");
        let mut db = TargetDatabase::load(&db_path, "foo", "android").unwrap();
        db.create(
            "abc123",
            "bar",
            "txt",
            "android",
            vec![],
            "bar.txt",
            "copy-compiler",
            1,
            vec![],
        );
        let entry = db.query_by_relative_path("abc123").unwrap();
        assert_eq!(entry.source_path, "bar.txt");
    }

    #[test]
    fn remove_actually_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("foo.android.target.json");
        let mut db = TargetDatabase::load(&db_path, "foo", "android").unwrap();
        db.create("abc123", "bar", "txt", "android", vec![], "bar.txt", "c", 1, vec![]);
        db.remove("abc123");
        assert!(db.query_by_relative_path("abc123").is_none());
    }

    #[test]
    fn no_entry_means_outputs_considered_present() {
        assert!(build_outputs_exist(None));
    }

    #[test]
    fn missing_output_file_fails_check() {
        let entry = TargetEntry {
            relative_path: "abc".to_owned(),
            resource_name: "bar".to_owned(),
            resource_type: "txt".to_owned(),
            platform: "android".to_owned(),
            properties: vec![],
            source_path: "bar.txt".to_owned(),
            compiler_name: "c".to_owned(),
            compiler_version: 1,
            outputs: vec!["/does/not/exist".to_owned()],
        };
        assert!(!build_outputs_exist(Some(&entry)));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("foo.android.target.json");
        let mut db = TargetDatabase::load(&db_path, "foo", "android").unwrap();
        db.create("abc123", "bar", "txt", "android", vec![], "bar.txt", "c", 1, vec![]);
        db.save(&db_path).unwrap();

        let reloaded = TargetDatabase::load(&db_path, "foo", "android").unwrap();
        assert_eq!(reloaded.entries().len(), 1);
        assert!(!reloaded.is_dirty());
    }
}
