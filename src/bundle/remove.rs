// src/bundle/remove.rs

//! Bundle removal
//!
//! Removal must never delete content another installed bundle still
//! owns. The retain-set is the consolidated file list of every bundle
//! that stays installed; the bundle's own file list is de-duplicated
//! against it before anything is unlinked.

use super::{init, OS_CORE_BUNDLE};
use crate::config::UpdaterConfig;
use crate::filesystem;
use crate::manifest::{
    consolidate_files, files_from_bundles, is_included, recurse_manifest, sort_files_by_path,
    FileEntry, FileKind, ManifestLoader,
};
use crate::repository::ContentSource;
use crate::subscriptions::{is_tracked_bundle, rm_tracking_file, Subscriptions};
use crate::version::get_current_version;
use crate::{Error, Result};
use std::fs;
use tracing::{debug, info, warn};

/// Remove one installed bundle.
pub fn remove_bundle(config: &UpdaterConfig, name: &str) -> Result<()> {
    let _lock = init(config)?;

    // os-core carries the system; refuse before doing any work
    if name == OS_CORE_BUNDLE {
        return Err(Error::BundleNotTracked(name.to_string()));
    }

    if !is_tracked_bundle(config, name) {
        warn!("Bundle \"{}\" does not seem to be installed", name);
        return Err(Error::BundleNotTracked(name.to_string()));
    }

    let current_version = get_current_version(&config.path_prefix)?;

    let source = ContentSource::new(&config.content_url)?;
    let loader = ManifestLoader::new(config, &source);
    let mut mom = loader.load_mom(current_version)?;

    if mom.search_bundle(name).is_none() {
        warn!("Bundle name \"{}\" is invalid, aborting removal", name);
        return Err(Error::BundleRemove(format!(
            "\"{name}\" is not part of this OS release"
        )));
    }

    // Resolve the view of everything that stays installed
    let mut subs = Subscriptions::load_tracked(config)?;
    subs.unsubscribe(name)?;
    subs.set_versions_from_mom(&mom);

    mom.submanifests = recurse_manifest(&subs, &loader, &mom, None)?;

    if is_included(name, &mom.submanifests) {
        warn!(
            "Bundle \"{}\" is required by other installed bundles",
            name
        );
        return Err(Error::BundleRemove(format!(
            "\"{name}\" is required by other installed bundles"
        )));
    }

    mom.files = consolidate_files(files_from_bundles(&mom.submanifests));

    // The removal candidate's own manifest, no include expansion
    let bundle_manifest = recurse_manifest(&subs, &loader, &mom, Some(name))?
        .into_iter()
        .next()
        .ok_or_else(|| Error::RecurseManifest(name.to_string()))?;

    let mut bundle_files = bundle_manifest.files.clone();
    sort_files_by_path(&mut bundle_files);
    let surviving = crate::manifest::deduplicate_files(bundle_files, &mom.files);

    info!(
        "Deleting {} file(s) uniquely owned by \"{}\"...",
        surviving.len(),
        name
    );
    remove_files_from_fs(config, &surviving);

    info!("Untracking bundle from system...");
    rm_tracking_file(config, name)?;

    info!("Bundle \"{}\" removed", name);
    Ok(())
}

/// Unlink the surviving entries. Regular files and symlinks are
/// removed; directories only when empty, since a non-empty directory is
/// shared with content that stays. Individual failures are logged and
/// skipped so one stubborn path cannot abort the walk.
fn remove_files_from_fs(config: &UpdaterConfig, files: &[FileEntry]) {
    let (dirs, regulars): (Vec<&FileEntry>, Vec<&FileEntry>) = files
        .iter()
        .filter(|f| !f.is_deleted())
        .partition(|f| f.kind == FileKind::Directory);

    for file in regulars {
        let target = match filesystem::target_path(&config.path_prefix, &file.path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping {}: {}", file.path, e);
                continue;
            }
        };

        match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_dir() => {
                debug!("Manifest says file but disk says directory: {}", file.path);
            }
            Ok(_) => match fs::remove_file(&target) {
                Ok(()) => debug!("Removed {}", file.path),
                Err(e) => warn!("Failed to remove {}: {}", file.path, e),
            },
            Err(_) => debug!("{} already gone", file.path),
        }
    }

    // Deepest first so children go before their parents
    let mut dirs = dirs;
    dirs.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

    for dir in dirs {
        let target = match filesystem::target_path(&config.path_prefix, &dir.path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping {}: {}", dir.path, e);
                continue;
            }
        };

        match fs::remove_dir(&target) {
            Ok(()) => debug!("Removed directory {}", dir.path),
            Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
                debug!("Directory {} not empty, keeping", dir.path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Directory {} already gone", dir.path);
            }
            Err(e) => warn!("Failed to remove directory {}: {}", dir.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_walk_spares_nonempty_dirs() {
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::with_prefix(temp.path());

        fs::create_dir_all(temp.path().join("usr/share/ed")).unwrap();
        fs::write(temp.path().join("usr/share/ed/notes"), b"n").unwrap();
        fs::write(temp.path().join("usr/share/ed/keep"), b"k").unwrap();

        let files = vec![
            FileEntry::new("/usr/share/ed", &"aa".repeat(32), FileKind::Directory, 10),
            FileEntry::new("/usr/share/ed/notes", &"bb".repeat(32), FileKind::File, 10),
        ];

        remove_files_from_fs(&config, &files);

        assert!(!temp.path().join("usr/share/ed/notes").exists());
        // "keep" is foreign content, so the directory must survive
        assert!(temp.path().join("usr/share/ed").is_dir());
        assert!(temp.path().join("usr/share/ed/keep").exists());
    }

    #[test]
    fn test_remove_walk_removes_empty_dirs_deepest_first() {
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::with_prefix(temp.path());

        fs::create_dir_all(temp.path().join("opt/tool/share")).unwrap();

        let files = vec![
            FileEntry::new("/opt/tool", &"aa".repeat(32), FileKind::Directory, 10),
            FileEntry::new("/opt/tool/share", &"bb".repeat(32), FileKind::Directory, 10),
        ];

        remove_files_from_fs(&config, &files);

        assert!(!temp.path().join("opt/tool").exists());
        assert!(temp.path().join("opt").is_dir());
    }

    #[test]
    fn test_remove_walk_tolerates_missing_paths() {
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::with_prefix(temp.path());

        let files = vec![FileEntry::new(
            "/usr/bin/phantom",
            &"aa".repeat(32),
            FileKind::File,
            10,
        )];
        // Must not panic
        remove_files_from_fs(&config, &files);
    }

    #[test]
    fn test_tombstones_never_unlinked() {
        let temp = TempDir::new().unwrap();
        let config = UpdaterConfig::with_prefix(temp.path());

        fs::create_dir_all(temp.path().join("usr/bin")).unwrap();
        fs::write(temp.path().join("usr/bin/ed"), b"live").unwrap();

        let mut tombstone =
            FileEntry::new("/usr/bin/ed", &"00".repeat(32), FileKind::File, 10);
        tombstone.flags.is_deleted = true;

        remove_files_from_fs(&config, &[tombstone]);
        assert!(temp.path().join("usr/bin/ed").exists());
    }
}
