// src/manifest/consolidate.rs

//! File list consolidation and de-duplication
//!
//! Several bundles may own the same path. Consolidation merges their file
//! lists into a single per-path view with a deterministic precedence:
//! highest version wins, non-deleted beats deleted at equal version, and
//! hash order breaks the remaining ties. De-duplication protects shared
//! content during removal: any path that also appears in the retained
//! bundles' consolidated list is dropped from the removal set.

use crate::manifest::{FileEntry, Manifest};
use std::cmp::Ordering;

/// Concatenate all bundles' file lists, preserving input order.
pub fn files_from_bundles(bundles: &[Manifest]) -> Vec<FileEntry> {
    let mut files = Vec::new();
    for bundle in bundles {
        files.extend(bundle.files.iter().cloned());
    }
    files
}

/// Total ordering used by consolidation: `(path ASC, version DESC,
/// deleted-last, hash ASC)`.
fn consolidation_order(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.path
        .cmp(&b.path)
        .then_with(|| b.last_change.cmp(&a.last_change))
        .then_with(|| a.flags.is_deleted.cmp(&b.flags.is_deleted))
        .then_with(|| a.hash.cmp(&b.hash))
}

/// Collapse a merged file list to one entry per path.
///
/// After sorting, the first entry of each path run wins, so the result
/// holds the highest-version, non-deleted candidate for every path and is
/// deterministic for identical inputs.
pub fn consolidate_files(mut files: Vec<FileEntry>) -> Vec<FileEntry> {
    files.sort_by(consolidation_order);
    files.dedup_by(|a, b| a.path == b.path);
    files
}

/// Sort a file list ascending by path, the precondition for
/// [`deduplicate_files`].
pub fn sort_files_by_path(files: &mut [FileEntry]) {
    files.sort_by(|a, b| a.path.cmp(&b.path));
}

/// Drop from `bundle_files` every entry whose path appears in
/// `reference`.
///
/// Both lists must be sorted ascending by path; the walk is a single
/// lock-step pass. During remove this keeps files still owned by an
/// installed bundle off the unlink list.
pub fn deduplicate_files(bundle_files: Vec<FileEntry>, reference: &[FileEntry]) -> Vec<FileEntry> {
    let mut surviving = Vec::with_capacity(bundle_files.len());
    let mut retained = reference.iter().peekable();

    for file in bundle_files {
        while let Some(r) = retained.peek() {
            if r.path.as_str() < file.path.as_str() {
                retained.next();
            } else {
                break;
            }
        }
        match retained.peek() {
            Some(r) if r.path == file.path => {
                // Shared with a retained bundle; never unlink
            }
            _ => surviving.push(file),
        }
    }

    surviving
}
