// tests/common/mod.rs

//! Shared test utilities for integration tests.
//!
//! Builds a complete update world inside a TempDir: a target root with
//! an os-release, a state directory, and a local content mirror holding
//! manifests, fullfiles and a MoM. Tests drive the real bundle
//! operations against it; no network is involved.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use swup::UpdaterConfig;
use tempfile::TempDir;

/// A self-contained update world.
pub struct TestWorld {
    // Keep the TempDir alive for the whole test
    pub temp: TempDir,
    pub config: UpdaterConfig,
    pub mirror: PathBuf,
    pub version: u32,
}

/// One record destined for a bundle manifest.
pub struct ManifestLine(String);

impl TestWorld {
    pub fn new(version: u32) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let state = temp.path().join("state");
        let mirror = temp.path().join("mirror");

        fs::create_dir_all(root.join("usr/lib")).unwrap();
        fs::write(
            root.join("usr/lib/os-release"),
            format!("NAME=\"Test OS\"\nID=testos\nVERSION_ID={version}\n"),
        )
        .unwrap();

        fs::create_dir_all(&mirror).unwrap();
        // Network probe target
        fs::write(mirror.join("version"), format!("{version}\n")).unwrap();

        let config = UpdaterConfig {
            path_prefix: root,
            state_dir: state,
            content_url: mirror.display().to_string(),
            version_url: mirror.display().to_string(),
            sig_check: false,
            pubkey_path: None,
            ignore_prefixes: Vec::new(),
            post_update_hook: None,
        };

        Self {
            temp,
            config,
            mirror,
            version,
        }
    }

    pub fn root(&self) -> &Path {
        self.config.path_prefix.as_path()
    }

    /// Register a fullfile tar for `content` and return its hash.
    pub fn add_fullfile(&self, content: &[u8], mode: u32) -> String {
        let hash = hash_bytes(content);
        let dir = self.mirror.join(format!("{}/files", self.version));
        fs::create_dir_all(&dir).unwrap();

        let archive_path = dir.join(format!("{hash}.tar"));
        if !archive_path.exists() {
            let file = File::create(&archive_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            builder.append_data(&mut header, &hash, content).unwrap();
            builder.finish().unwrap();
        }

        hash
    }

    /// Manifest record for a regular file, registering its fullfile.
    pub fn file_line(&self, path: &str, content: &[u8], mode: u32) -> ManifestLine {
        let hash = self.add_fullfile(content, mode);
        ManifestLine(format!("F...\t{hash}\t{}\t{path}", self.version))
    }

    /// Manifest record for a directory.
    pub fn dir_line(&self, path: &str) -> ManifestLine {
        let hash = hash_bytes(path.as_bytes());
        ManifestLine(format!("D...\t{hash}\t{}\t{path}", self.version))
    }

    /// Manifest record for a symlink, registering its target blob.
    pub fn link_line(&self, path: &str, target: &str) -> ManifestLine {
        let hash = self.add_fullfile(target.as_bytes(), 0o644);
        ManifestLine(format!("L...\t{hash}\t{}\t{path}", self.version))
    }

    /// Manifest record for a bundle's own tracking marker.
    pub fn marker_line(&self, bundle: &str) -> ManifestLine {
        self.file_line(
            &format!("/usr/share/clear/bundles/{bundle}"),
            b"",
            0o644,
        )
    }

    /// Write `Manifest.<name>` to the mirror and return its hash for
    /// the MoM pointer.
    pub fn write_bundle_manifest(
        &self,
        name: &str,
        includes: &[&str],
        lines: &[ManifestLine],
    ) -> String {
        let mut text = String::new();
        text.push_str("MANIFEST\t1\n");
        text.push_str(&format!("version:\t{}\n", self.version));
        text.push_str("previous:\t0\n");
        text.push_str(&format!("filecount:\t{}\n", lines.len()));
        text.push_str("timestamp:\t1690000000\n");
        text.push_str("contentsize:\t0\n");
        for include in includes {
            text.push_str(&format!("includes:\t{include}\n"));
        }
        text.push('\n');
        for line in lines {
            text.push_str(&line.0);
            text.push('\n');
        }

        let dir = self.mirror.join(self.version.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("Manifest.{name}")), &text).unwrap();
        hash_bytes(text.as_bytes())
    }

    /// Write the MoM listing `(bundle, manifest_hash)` pointers.
    pub fn write_mom(&self, pointers: &[(&str, &str)]) {
        let mut text = String::new();
        text.push_str("MANIFEST\t1\n");
        text.push_str(&format!("version:\t{}\n", self.version));
        text.push_str(&format!("filecount:\t{}\n", pointers.len()));
        text.push('\n');
        for (name, hash) in pointers {
            text.push_str(&format!("M...\t{hash}\t{}\t{name}\n", self.version));
        }

        let dir = self.mirror.join(self.version.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Manifest.MoM"), &text).unwrap();
    }

    /// Pretend `bundle` was installed by an earlier operation: write its
    /// marker directly.
    pub fn mark_tracked(&self, bundle: &str) {
        let dir = self.config.tracked_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(bundle), b"").unwrap();
    }

    pub fn is_tracked(&self, bundle: &str) -> bool {
        self.config.tracked_marker(bundle).exists()
    }

    /// The standard os-core: the directory skeleton plus its marker.
    pub fn os_core_lines(&self) -> Vec<ManifestLine> {
        vec![
            self.dir_line("/usr"),
            self.dir_line("/usr/bin"),
            self.dir_line("/usr/lib"),
            self.dir_line("/usr/share"),
            self.dir_line("/usr/share/clear"),
            self.dir_line("/usr/share/clear/bundles"),
            self.marker_line("os-core"),
        ]
    }
}

/// Escape hatch for records the helpers do not cover (tombstones and
/// friends).
pub fn raw_line(line: String) -> ManifestLine {
    ManifestLine(line)
}

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Collect every path under `dir` whose file name starts with
/// `.update.` - leftovers of an interrupted or aborted staging pass.
pub fn find_staged_leftovers(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(find_staged_leftovers(&path));
        } else if entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(".update."))
        {
            found.push(path);
        }
    }
    found
}
