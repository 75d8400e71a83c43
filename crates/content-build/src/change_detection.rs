//! Builder change detection, `spec.md` §4.8.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::source_db::{self, SourceDatabase, SourceEntry};
use crate::target_db::{self, TargetEntry};

/// A point-in-time copy of a package's Source DB entries, keyed by
/// `relative_path`, taken before a walk's `create()` calls refresh every
/// entry's `write_time`/`file_size` to the current stat. `create()`
/// always overwrites those fields (`spec.md` §4.2), so comparing a file
/// against the *live* database would always see "unmodified" — even a
/// file that changed a moment ago. Change detection compares against
/// this snapshot instead, so it still reflects the last successful
/// build's baseline regardless of where in the walk a file (or one of
/// its dependencies) falls.
pub fn snapshot(database: &SourceDatabase) -> HashMap<String, SourceEntry> {
    database
        .entries()
        .iter()
        .map(|entry| (entry.relative_path.clone(), entry.clone()))
        .collect()
}

/// `entry.writeTime != stat.mtime OR entry.fileSize != stat.size`,
/// against `relative_path`'s baseline record. A file with no baseline
/// entry has never been observed by a prior build and is therefore
/// always considered modified. Any I/O error stating the file is
/// likewise treated as "modified" (forces a rebuild), matching the
/// propagation policy in `spec.md` §7.
pub fn source_file_modified(root_path: &Path, baseline: &HashMap<String, SourceEntry>, relative_path: &str) -> bool {
    let Some(entry) = baseline.get(relative_path) else {
        return true;
    };
    let abs_path = root_path.join(relative_path);
    match source_db::stat_millis(&abs_path) {
        Ok((write_time, file_size)) => source_db::source_file_modified(entry, write_time, file_size),
        Err(_) => true,
    }
}

/// Depth-first dependency walk over the baseline snapshot. A defensive
/// visited set guards against the cyclic dependency graphs
/// `dependencies`/`references` allow (`spec.md` §9): a dependency
/// already on the current path is treated as "not modified by this
/// path" rather than recursing forever.
pub fn dependencies_modified(root_path: &Path, baseline: &HashMap<String, SourceEntry>, relative_path: &str) -> bool {
    let mut visited = HashSet::new();
    dependencies_modified_visited(root_path, baseline, relative_path, &mut visited)
}

fn dependencies_modified_visited(
    root_path: &Path,
    baseline: &HashMap<String, SourceEntry>,
    relative_path: &str,
    visited: &mut HashSet<String>,
) -> bool {
    if !visited.insert(relative_path.to_owned()) {
        return false;
    }

    if source_file_modified(root_path, baseline, relative_path) {
        return true;
    }

    let entry = baseline
        .get(relative_path)
        .expect("source_file_modified returned false, so a baseline entry exists");

    for dep_abs_path in &entry.dependencies {
        let Some(dep_relative) = source_db::relative_key(root_path, Path::new(dep_abs_path)) else {
            return true;
        };
        if !baseline.contains_key(&dep_relative) {
            return true;
        }
        if dependencies_modified_visited(root_path, baseline, &dep_relative, visited) {
            return true;
        }
    }

    false
}

/// `buildOutputsExist`: no entry means nothing to verify (returns
/// `true`); otherwise every recorded output path must still exist.
pub fn build_outputs_exist(entry: Option<&TargetEntry>) -> bool {
    target_db::build_outputs_exist(entry)
}

/// `dependenciesModified OR NOT buildOutputsExist`.
pub fn requires_rebuild(
    root_path: &Path,
    baseline: &HashMap<String, SourceEntry>,
    relative_path: &str,
    target_entry: Option<&TargetEntry>,
) -> bool {
    dependencies_modified(root_path, baseline, relative_path) || !build_outputs_exist(target_entry)
}
