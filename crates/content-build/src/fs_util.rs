//! Filesystem tree walking.
//!
//! `spec.md` treats the full utility layer (`scan`, `diff`, `walk`,
//! `make_tree`) as an external, supplied library; `walk` is the one
//! operation the Builder actually calls, so it is implemented here on
//! top of `walkdir` rather than stubbed out.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Lists every regular file under `root`, optionally recursing into
/// subdirectories and skipping dotfiles/dot-directories.
pub fn walk(root: &Path, ignore_hidden: bool, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut walker = WalkDir::new(root);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !(ignore_hidden && is_hidden(e))) {
        let entry = entry.map_err(|err| {
            let path = err.path().map(Path::to_owned).unwrap_or_else(|| root.to_owned());
            Error::Io(path, std::io::Error::new(std::io::ErrorKind::Other, err))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(root = %root.display(), count = files.len(), "walked tree");
    Ok(files)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}
