// src/filesystem/stager.rs

//! Content staging and atomic commit
//!
//! Install never writes a user-visible path directly. Each file's
//! content blob is first ensured under `<state>/staged/<hash>`
//! (extracted from a pack, or fetched as a fullfile on miss), then
//! materialized as `.update.<name>` next to its final path, and finally
//! committed with a single `rename(2)`. Directories commit in place:
//! they are created empty and never carry content.
//!
//! Staging requires the parent directory to exist already; when it does
//! not, [`Stager::verify_fix_path`] rebuilds the missing lineage from
//! the canonical directory entries in the consolidated manifest view.

use crate::config::UpdaterConfig;
use crate::filesystem::{self, DIRECTORY_MODE};
use crate::manifest::{FileEntry, FileKind, Manifest};
use crate::repository::ContentSource;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

pub struct Stager<'a> {
    config: &'a UpdaterConfig,
    source: &'a ContentSource,
}

impl<'a> Stager<'a> {
    pub fn new(config: &'a UpdaterConfig, source: &'a ContentSource) -> Self {
        Self { config, source }
    }

    /// Make sure the content blob for `file` exists under `staged/` and
    /// passes its hash, fetching the fullfile on a miss.
    fn ensure_blob(&self, file: &FileEntry) -> Result<PathBuf> {
        let blob = self.config.staged_dir().join(&file.hash);

        if blob.exists() {
            if blob_digest(&blob)? == file.hash {
                return Ok(blob);
            }
            warn!("Staged blob {} fails its hash, refetching", file.hash);
            fs::remove_file(&blob)?;
        }

        let rel = format!("{}/files/{}.tar", file.last_change, file.hash);
        let archive = self
            .config
            .download_dir()
            .join(format!("{}.tar", file.hash));
        self.source.fetch_to(&rel, &archive)?;
        extract_fullfile(&archive, &file.hash, &blob)?;
        let _ = fs::remove_file(&archive);

        let actual = blob_digest(&blob)?;
        if actual != file.hash {
            fs::remove_file(&blob)?;
            return Err(Error::ChecksumMismatch {
                expected: file.hash.clone(),
                actual,
            });
        }

        Ok(blob)
    }

    /// Stage one file next to its final path and record the staged
    /// location in `file.staging`.
    ///
    /// Fails when the parent directory is missing; the caller repairs
    /// the lineage with [`Stager::verify_fix_path`] and retries.
    pub fn do_staging(&self, file: &mut FileEntry) -> Result<()> {
        let target = filesystem::target_path(&self.config.path_prefix, &file.path)?;

        match file.kind {
            FileKind::Manifest => {
                debug!("Not staging manifest pointer {}", file.path);
                file.staging = None;
                Ok(())
            }
            FileKind::Directory => {
                if !target.is_dir() {
                    let parent = required_parent(&target, &file.path)?;
                    if !parent.is_dir() {
                        return Err(Error::IoError(format!(
                            "missing parent directory for {}",
                            file.path
                        )));
                    }
                    fs::create_dir(&target)?;
                    fs::set_permissions(&target, fs::Permissions::from_mode(DIRECTORY_MODE))?;
                }
                // Directories commit in place; the rename pass just
                // confirms they exist
                file.staging = Some(target);
                Ok(())
            }
            FileKind::File | FileKind::Link => {
                let parent = required_parent(&target, &file.path)?;
                if !parent.is_dir() {
                    return Err(Error::IoError(format!(
                        "missing parent directory for {}",
                        file.path
                    )));
                }

                let blob = self.ensure_blob(file)?;

                let name = target
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::IoError(format!("bad file name in {}", file.path)))?;
                let update = parent.join(format!(".update.{name}"));

                if fs::symlink_metadata(&update).is_ok() {
                    fs::remove_file(&update)?;
                }

                match file.kind {
                    FileKind::File => {
                        // fs::copy carries the blob's permission bits
                        fs::copy(&blob, &update)?;
                    }
                    FileKind::Link => {
                        let link_target = fs::read_to_string(&blob)?;
                        std::os::unix::fs::symlink(link_target.trim_end(), &update)?;
                    }
                    _ => unreachable!(),
                }

                debug!("Staged {} at {}", file.path, update.display());
                file.staging = Some(update);
                Ok(())
            }
        }
    }

    /// Rebuild missing parent directories for `path` from their
    /// canonical entries in the MoM's consolidated file view.
    ///
    /// Repaired directories commit immediately; they are safe to create
    /// outside the rename pass because they are empty.
    pub fn verify_fix_path(&self, path: &str, mom: &Manifest) -> Result<()> {
        for dir in parent_chain(path) {
            let target = filesystem::target_path(&self.config.path_prefix, &dir)?;
            if target.is_dir() {
                continue;
            }

            let entry = mom.search_file(&dir).ok_or_else(|| {
                Error::IoError(format!(
                    "missing directory {dir} has no entry in the installed manifests"
                ))
            })?;
            if entry.kind != FileKind::Directory || entry.is_deleted() {
                return Err(Error::IoError(format!(
                    "manifest entry for {dir} is not an installable directory"
                )));
            }

            if fs::symlink_metadata(&target).is_ok() {
                // A non-directory squats on the path; replace it
                fs::remove_file(&target)?;
            }
            fs::create_dir(&target)?;
            fs::set_permissions(&target, fs::Permissions::from_mode(DIRECTORY_MODE))?;
            info!("Repaired directory lineage: {}", dir);
        }
        Ok(())
    }

    /// Commit a staged file onto its final path.
    pub fn rename_staged_to_final(&self, file: &FileEntry) -> Result<()> {
        let target = filesystem::target_path(&self.config.path_prefix, &file.path)?;

        match file.kind {
            FileKind::Manifest => Ok(()),
            FileKind::Directory => {
                if !target.is_dir() {
                    fs::create_dir(&target)?;
                    fs::set_permissions(&target, fs::Permissions::from_mode(DIRECTORY_MODE))?;
                }
                Ok(())
            }
            FileKind::File | FileKind::Link => {
                let staging = file.staging.as_ref().ok_or_else(|| {
                    Error::IoError(format!("{} was never staged", file.path))
                })?;
                fs::rename(staging, &target)?;
                debug!("Committed {}", file.path);
                Ok(())
            }
        }
    }
}

fn required_parent<'p>(target: &'p Path, path: &str) -> Result<&'p Path> {
    target
        .parent()
        .ok_or_else(|| Error::IoError(format!("no parent for {path}")))
}

/// Parent directories of `path`, shallowest first, excluding the root.
fn parent_chain(path: &str) -> Vec<String> {
    let mut chain: Vec<String> = Path::new(path)
        .ancestors()
        .skip(1)
        .filter(|p| p.as_os_str().len() > 1)
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    chain.reverse();
    chain
}

fn blob_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Pull the single `<hash>` entry out of a fullfile archive and place it
/// at `blob`, keeping the archived permission bits.
fn extract_fullfile(archive_path: &Path, hash: &str, blob: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(file);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let is_blob_entry = path.components().count() == 1
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == hash);
        if is_blob_entry {
            entry.unpack(blob)?;
            return Ok(());
        }
    }

    Err(Error::DownloadError(format!(
        "fullfile archive for {hash} holds no matching entry"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        config: UpdaterConfig,
        mirror: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("mirror");
        let config = UpdaterConfig {
            path_prefix: temp.path().join("root"),
            state_dir: temp.path().join("state"),
            content_url: mirror.display().to_string(),
            sig_check: false,
            ..Default::default()
        };
        fs::create_dir_all(&config.path_prefix).unwrap();
        fs::create_dir_all(config.staged_dir()).unwrap();
        fs::create_dir_all(config.download_dir()).unwrap();
        fs::create_dir_all(&mirror).unwrap();
        Fixture {
            _temp: temp,
            config,
            mirror,
        }
    }

    fn hash_bytes(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    fn add_fullfile(fx: &Fixture, version: u32, content: &[u8], mode: u32) -> String {
        let hash = hash_bytes(content);
        let dir = fx.mirror.join(format!("{version}/files"));
        fs::create_dir_all(&dir).unwrap();

        let file = File::create(dir.join(format!("{hash}.tar"))).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, &hash, content).unwrap();
        builder.finish().unwrap();

        hash
    }

    #[test]
    fn test_stage_and_commit_regular_file() {
        let fx = fixture();
        fs::create_dir_all(fx.config.path_prefix.join("usr/bin")).unwrap();

        let hash = add_fullfile(&fx, 10, b"#!/bin/sh\necho ed\n", 0o755);
        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut file = FileEntry::new("/usr/bin/ed", &hash, FileKind::File, 10);
        stager.do_staging(&mut file).unwrap();

        let staged = file.staging.clone().unwrap();
        assert!(staged.ends_with(".update.ed"));
        assert!(staged.exists());
        assert!(!fx.config.path_prefix.join("usr/bin/ed").exists());

        stager.rename_staged_to_final(&file).unwrap();
        let target = fx.config.path_prefix.join("usr/bin/ed");
        assert!(!staged.exists());
        assert_eq!(fs::read(&target).unwrap(), b"#!/bin/sh\necho ed\n");
        assert_eq!(
            fs::metadata(&target).unwrap().permissions().mode() & 0o777,
            0o755
        );
    }

    #[test]
    fn test_stage_missing_parent_fails_then_repair() {
        let fx = fixture();

        let hash = add_fullfile(&fx, 10, b"content", 0o644);
        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut file = FileEntry::new("/usr/bin/ed", &hash, FileKind::File, 10);
        assert!(stager.do_staging(&mut file).is_err());

        // Consolidated view carrying the canonical directory entries
        let mut mom = Manifest::new("MoM", 10);
        mom.files.push(FileEntry::new(
            "/usr",
            &"aa".repeat(32),
            FileKind::Directory,
            10,
        ));
        mom.files.push(FileEntry::new(
            "/usr/bin",
            &"bb".repeat(32),
            FileKind::Directory,
            10,
        ));

        stager.verify_fix_path("/usr/bin/ed", &mom).unwrap();
        assert!(fx.config.path_prefix.join("usr/bin").is_dir());

        stager.do_staging(&mut file).unwrap();
        stager.rename_staged_to_final(&file).unwrap();
        assert!(fx.config.path_prefix.join("usr/bin/ed").exists());
    }

    #[test]
    fn test_repair_without_manifest_entry_fails() {
        let fx = fixture();
        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mom = Manifest::new("MoM", 10);
        assert!(stager.verify_fix_path("/usr/bin/ed", &mom).is_err());
        assert!(!fx.config.path_prefix.join("usr").exists());
    }

    #[test]
    fn test_stage_symlink() {
        let fx = fixture();
        fs::create_dir_all(fx.config.path_prefix.join("usr/bin")).unwrap();

        let hash = add_fullfile(&fx, 10, b"/usr/bin/ed", 0o644);
        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut link = FileEntry::new("/usr/bin/red", &hash, FileKind::Link, 10);
        stager.do_staging(&mut link).unwrap();
        stager.rename_staged_to_final(&link).unwrap();

        let target = fx.config.path_prefix.join("usr/bin/red");
        assert_eq!(
            fs::read_link(&target).unwrap(),
            PathBuf::from("/usr/bin/ed")
        );
    }

    #[test]
    fn test_directory_commits_in_place() {
        let fx = fixture();
        fs::create_dir_all(fx.config.path_prefix.join("usr")).unwrap();

        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut dir = FileEntry::new("/usr/share", &"cc".repeat(32), FileKind::Directory, 10);
        stager.do_staging(&mut dir).unwrap();

        let target = fx.config.path_prefix.join("usr/share");
        assert!(target.is_dir());
        assert_eq!(
            fs::metadata(&target).unwrap().permissions().mode() & 0o777,
            DIRECTORY_MODE
        );

        // Idempotent for an existing directory
        stager.do_staging(&mut dir).unwrap();
        stager.rename_staged_to_final(&dir).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_blob_reused_across_files() {
        let fx = fixture();
        fs::create_dir_all(fx.config.path_prefix.join("a")).unwrap();
        fs::create_dir_all(fx.config.path_prefix.join("b")).unwrap();

        let hash = add_fullfile(&fx, 10, b"shared", 0o644);
        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut one = FileEntry::new("/a/x", &hash, FileKind::File, 10);
        stager.do_staging(&mut one).unwrap();

        // Drop the mirror copy: the second staging must come from the blob
        fs::remove_dir_all(fx.mirror.join("10")).unwrap();

        let mut two = FileEntry::new("/b/x", &hash, FileKind::File, 10);
        stager.do_staging(&mut two).unwrap();
        assert!(two.staging.unwrap().exists());
    }

    #[test]
    fn test_corrupt_blob_refetched() {
        let fx = fixture();
        fs::create_dir_all(fx.config.path_prefix.join("a")).unwrap();

        let hash = add_fullfile(&fx, 10, b"good content", 0o644);
        // Pre-seed a corrupt blob under the right name
        fs::write(fx.config.staged_dir().join(&hash), b"corrupt").unwrap();

        let source = ContentSource::new(&fx.config.content_url).unwrap();
        let stager = Stager::new(&fx.config, &source);

        let mut file = FileEntry::new("/a/x", &hash, FileKind::File, 10);
        stager.do_staging(&mut file).unwrap();
        stager.rename_staged_to_final(&file).unwrap();
        assert_eq!(
            fs::read(fx.config.path_prefix.join("a/x")).unwrap(),
            b"good content"
        );
    }

    #[test]
    fn test_parent_chain() {
        assert_eq!(
            parent_chain("/usr/bin/ed"),
            vec!["/usr".to_string(), "/usr/bin".to_string()]
        );
        assert_eq!(parent_chain("/vmlinuz"), Vec::<String>::new());
    }
}
