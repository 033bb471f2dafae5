// src/filesystem/mod.rs

//! Filesystem placement
//!
//! All mutation of the target root flows through this module: computing
//! safe target paths, staging content next to its final location, and
//! committing with atomic renames.

mod stager;

pub use stager::Stager;

use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Mode used for directories the updater materializes.
pub const DIRECTORY_MODE: u32 = 0o755;

/// Validate a manifest path and resolve it under the target root.
///
/// Rejects `..` components and anything that would land outside the
/// root; manifests are signed but a damaged or hostile one must not be
/// able to reach out of the prefix.
pub fn target_path(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = path.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                warn!("Path traversal attempt detected: {}", path);
                return Err(Error::IoError(format!("path traversal detected: {path}")));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::IoError(format!("empty path \"{path}\"")));
    }

    let target = root.join(&normalized);
    if !target.starts_with(root) {
        warn!("Path escaped target root: {} -> {:?}", path, target);
        return Err(Error::IoError(format!("path escapes target root: {path}")));
    }

    Ok(target)
}

/// Remove the contents of a directory, keeping the directory itself.
pub fn clear_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Whole-filesystem durability barrier, issued after all renames and
/// before post-install scripts run.
pub fn sync_filesystem() {
    nix::unistd::sync();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_path_resolves_under_root() {
        let root = Path::new("/sysroot");
        assert_eq!(
            target_path(root, "/usr/bin/ed").unwrap(),
            PathBuf::from("/sysroot/usr/bin/ed")
        );
        assert_eq!(
            target_path(root, "usr/bin/ed").unwrap(),
            PathBuf::from("/sysroot/usr/bin/ed")
        );
    }

    #[test]
    fn test_target_path_rejects_traversal() {
        let root = Path::new("/sysroot");
        for bad in ["../etc/passwd", "/usr/../../etc/shadow", "a/../../b"] {
            assert!(target_path(root, bad).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_target_path_rejects_empty() {
        let root = Path::new("/sysroot");
        assert!(target_path(root, "").is_err());
        assert!(target_path(root, "/").is_err());
    }

    #[test]
    fn test_clear_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"x").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/b"), b"y").unwrap();

        clear_dir(temp.path()).unwrap();
        assert!(temp.path().exists());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_clear_dir_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        clear_dir(&temp.path().join("nope")).unwrap();
    }
}
