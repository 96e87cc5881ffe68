//! Initial scan of the watch root
//!
//! Produces the explicit set of files the watcher starts with.

use crate::ignore::IgnoreRules;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Collect every regular file under the root that is not ignored
///
/// Ignored directories are pruned without descending. Paths are absolute
/// (root-joined) and sorted.
pub fn initial_files(rules: &IgnoreRules) -> Result<Vec<PathBuf>, walkdir::Error> {
    let root = rules.root();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            match e.path().strip_prefix(root) {
                // The root itself
                Ok(rel) if rel.as_os_str().is_empty() => true,
                Ok(rel) => !rules.should_ignore(rel, e.file_type().is_dir()),
                Err(_) => false,
            }
        })
    {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}
