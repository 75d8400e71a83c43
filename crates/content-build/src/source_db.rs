//! Source Database, `spec.md` §4.2/§6.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::resource_path;

/// One known source file, keyed by `relative_path` within its package's
/// source root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub relative_path: String,
    pub resource_name: String,
    pub resource_type: String,
    pub platform: String,
    pub properties: Vec<String>,
    /// Reverse link: absolute paths of sources that depend on this one.
    pub references: Vec<String>,
    /// Absolute paths of sources this file's compiler reads as inputs.
    pub dependencies: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub write_time: i64,
    pub file_size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceContent {
    bundle_name: String,
    entries: Vec<SourceEntry>,
}

impl SourceContent {
    fn pre_serialize(&mut self) {
        self.entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    }
}

/// Persisted index of known source files for one package.
///
/// `entry_table[relative_path]` always points at the index of that
/// entry within `entries`; the two are kept in lockstep by every
/// mutating method, never by the caller.
#[derive(Debug)]
pub struct SourceDatabase {
    bundle_name: String,
    entries: Vec<SourceEntry>,
    entry_table: HashMap<String, usize>,
    dirty: bool,
}

impl SourceDatabase {
    fn reindex(&mut self) {
        self.entry_table = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.relative_path.clone(), i))
            .collect();
    }

    /// Loads a database from `path`. A missing file is not an error: it
    /// yields an empty, dirty database so the caller's first save creates
    /// it.
    pub fn load(path: &Path, bundle_name: &str) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "source database absent, starting empty");
                return Ok(Self {
                    bundle_name: bundle_name.to_owned(),
                    entries: Vec::new(),
                    entry_table: HashMap::new(),
                    dirty: true,
                });
            }
            Err(err) => return Err(Error::Io(path.to_owned(), err)),
        };
        let content: SourceContent =
            serde_json::from_str(&text).map_err(|err| Error::Format(path.to_owned(), err))?;
        let mut db = Self {
            bundle_name: content.bundle_name,
            entries: content.entries,
            entry_table: HashMap::new(),
            dirty: false,
        };
        db.reindex();
        debug!(path = %path.display(), entries = db.entries.len(), "loaded source database");
        Ok(db)
    }

    /// Serializes this database to `path` and clears `dirty` on success.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let mut content = SourceContent {
            bundle_name: self.bundle_name.clone(),
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
        debug!(path = %path.display(), entries = self.entries.len(), "saved source database");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Looks up the entry for `abs_path`, relative to `root_path`. Never
    /// fails: an unreadable or non-relative path simply yields `None`.
    pub fn query(&self, root_path: &Path, abs_path: &Path) -> Option<&SourceEntry> {
        let relative = relative_key(root_path, abs_path)?;
        self.entry_table.get(&relative).map(|&i| &self.entries[i])
    }

    pub fn query_by_relative_path(&self, relative_path: &str) -> Option<&SourceEntry> {
        self.entry_table.get(relative_path).map(|&i| &self.entries[i])
    }

    pub fn query_mut_by_relative_path(&mut self, relative_path: &str) -> Option<&mut SourceEntry> {
        let idx = *self.entry_table.get(relative_path)?;
        Some(&mut self.entries[idx])
    }

    /// Stats `abs_path`, derives resource metadata via the resource-path
    /// parser, and inserts or overwrites the entry at its relative key.
    /// `dependencies`/`references` are (re)created empty: the caller
    /// repopulates them once a build of this file succeeds.
    pub fn create(
        &mut self,
        root_path: &Path,
        abs_path: &Path,
        known_platforms: &[&str],
    ) -> Result<&SourceEntry> {
        let metadata = fs::metadata(abs_path).map_err(|err| Error::Io(abs_path.to_owned(), err))?;
        let relative_path = relative_key(root_path, abs_path)
            .ok_or_else(|| Error::NotUnderRoot(abs_path.to_owned(), root_path.to_owned()))?;
        let parsed = resource_path::parse(&relative_path);
        let platform = resource_path::derive_platform(&parsed.properties, known_platforms);
        let write_time = metadata
            .modified()
            .map_err(|err| Error::Io(abs_path.to_owned(), err))
            .map(write_time_millis)?;

        let entry = SourceEntry {
            relative_path: relative_path.clone(),
            resource_name: parsed.resource_name,
            resource_type: parsed.resource_type,
            platform,
            properties: parsed.properties,
            references: Vec::new(),
            dependencies: Vec::new(),
            write_time,
            file_size: metadata.len(),
        };

        match self.entry_table.get(&relative_path) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.entry_table.insert(relative_path.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        self.dirty = true;
        Ok(self.query_by_relative_path(&relative_path).unwrap())
    }

    /// Removes the entry for `abs_path`, if any, and marks the database
    /// dirty. Unlike a non-mutating filter, this actually deletes the
    /// entry and rebuilds the index so later lookups never see it.
    pub fn remove(&mut self, root_path: &Path, abs_path: &Path) {
        let Some(relative_path) = relative_key(root_path, abs_path) else {
            return;
        };
        if let Some(&idx) = self.entry_table.get(&relative_path) {
            self.entries.remove(idx);
            self.reindex();
            self.dirty = true;
        }
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }
}

pub(crate) fn relative_key(root_path: &Path, abs_path: &Path) -> Option<String> {
    abs_path
        .strip_prefix(root_path)
        .ok()
        .and_then(|p| p.to_str())
        .map(|s| s.replace('\\', "/"))
}

fn write_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Compares an entry's recorded write time/size against a fresh stat.
pub fn source_file_modified(entry: &SourceEntry, write_time: i64, file_size: u64) -> bool {
    entry.write_time != write_time || entry.file_size != file_size
}

pub fn stat_millis(path: &Path) -> Result<(i64, u64)> {
    let metadata = fs::metadata(path).map_err(|err| Error::Io(path.to_owned(), err))?;
    let modified = metadata
        .modified()
        .map_err(|err| Error::Io(path.to_owned(), err))?;
    Ok((write_time_millis(modified), metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn missing_file_is_empty_and_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.source.json");
        let db = SourceDatabase::load(&path, "foo").unwrap();
        assert!(db.is_dirty());
        assert!(db.entries().is_empty());
    }

    #[test]
    fn create_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("bar.txt");
        File::create(&file_path).unwrap().write_all(b"hi").unwrap();

        let db_path = dir.path().join("foo.source.json");
        let mut db = SourceDatabase::load(&db_path, "foo").unwrap();
        db.create(dir.path(), &file_path, &[]).unwrap();
        db.save(&db_path).unwrap();
        assert!(!db.is_dirty());

        let reloaded = SourceDatabase::load(&db_path, "foo").unwrap();
        let entry = reloaded.query(dir.path(), &file_path).unwrap();
        assert_eq!(entry.resource_name, "bar");
        assert_eq!(entry.resource_type, "txt");
    }

    #[test]
    fn remove_actually_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("bar.txt");
        File::create(&file_path).unwrap().write_all(b"hi").unwrap();

        let db_path = dir.path().join("foo.source.json");
        let mut db = SourceDatabase::load(&db_path, "foo").unwrap();
        db.create(dir.path(), &file_path, &[]).unwrap();
        assert!(db.query(dir.path(), &file_path).is_some());

        db.remove(dir.path(), &file_path);
        assert!(db.query(dir.path(), &file_path).is_none());
        assert!(db.entries().is_empty());
    }

    #[test]
    fn create_overwrites_rather_than_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("bar.txt");
        File::create(&file_path).unwrap().write_all(b"hi").unwrap();

        let db_path = dir.path().join("foo.source.json");
        let mut db = SourceDatabase::load(&db_path, "foo").unwrap();
        db.create(dir.path(), &file_path, &[]).unwrap();
        db.create(dir.path(), &file_path, &[]).unwrap();
        assert_eq!(db.entries().len(), 1);
    }
}
